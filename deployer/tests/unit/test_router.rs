//! HTTP router tests

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use serde_json::{json, Value};
use tower::ServiceExt;

use sitedrop::app::options::ServerOptions;
use sitedrop::blob::BlobStore;
use sitedrop::server::serve::router;
use sitedrop::server::state::ServerState;

use crate::support::{base64, zip_bytes, FakeRunner, Fixture};

fn app(fixture: &Fixture, options: &ServerOptions) -> Router {
    let blobs: Arc<dyn BlobStore> = fixture.blobs.clone();
    let state = ServerState::new(
        fixture.pipeline.clone(),
        blobs,
        vec!["github.com".to_string()],
        Duration::from_millis(10),
        Duration::from_secs(15),
    );
    router(options, Arc::new(state))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/deployments")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let fixture = Fixture::new(FakeRunner::default());
    let (status, body) = send(app(&fixture, &ServerOptions::default()), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["status"], "healthy");
    assert_eq!(value["service"], "sitedrop");
}

#[tokio::test]
async fn test_invalid_submissions_create_no_job() {
    let fixture = Fixture::new(FakeRunner::default());
    let options = ServerOptions::default();

    let cases = [
        json!({}),
        json!({ "repositoryUrl": "not-a-url" }),
        json!({ "repositoryUrl": "http://example.com/x" }),
        json!({ "repositoryUrl": "http://github.com/a/b" }),
        json!({ "repositoryUrl": "https://evil.example/a/b" }),
        json!({ "archive": { "name": "site.rar", "data": "aGVsbG8=" } }),
    ];
    for case in cases {
        let (status, body) = send(app(&fixture, &options), post_json(case.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", case);
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], false);
        assert!(value["deploymentId"].is_null());
        let message = value["message"].as_str().unwrap();
        assert!(message.starts_with("Invalid input: "), "{}", message);
    }

    let malformed = Request::builder()
        .method(Method::POST)
        .uri("/api/deployments")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(app(&fixture, &options), malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(fixture.jobs.is_empty());
}

#[tokio::test]
async fn test_oversized_submission_is_rejected() {
    let fixture = Fixture::new(FakeRunner::default());
    let options = ServerOptions {
        max_upload_bytes: 64,
        ..Default::default()
    };

    let data = "A".repeat(512);
    let request = post_json(json!({ "archive": { "name": "big.zip", "data": data } }));
    let (status, _) = send(app(&fixture, &options), request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(fixture.jobs.is_empty());
}

#[tokio::test]
async fn test_submit_then_serve_site() {
    let fixture = Fixture::new(FakeRunner::default());
    let options = ServerOptions::default();

    let zip = zip_bytes(&[
        ("index.html", "<h1>docs</h1>"),
        ("guide/index.html", "<h1>guide</h1>"),
        ("app.js", "console.log('docs')"),
    ]);
    let request = post_json(json!({ "archive": { "name": "docs.zip", "data": base64(&zip) } }));
    let (status, body) = send(app(&fixture, &options), request).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["success"], true);
    let id = value["deploymentId"].as_str().unwrap().to_string();

    let job = fixture.finished(&id).await;
    assert!(job.result.as_ref().unwrap().success, "{:?}", job.logs);

    // Snapshot
    let (status, body) = send(app(&fixture, &options), get(&format!("/api/deployments/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(snapshot["isDone"], true);
    assert_eq!(snapshot["status"], "Completed Successfully");
    assert_eq!(snapshot["result"]["deployedUrl"], "/sites/docs");

    // Site root, nested index and assets
    let (status, body) = send(app(&fixture, &options), get("/sites/docs/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"<h1>docs</h1>");

    let (status, body) = send(app(&fixture, &options), get("/sites/docs/guide")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"<h1>guide</h1>");

    let response = app(&fixture, &options)
        .oneshot(get("/sites/docs/app.js"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/javascript; charset=utf-8"
    );

    let (status, _) = send(app(&fixture, &options), get("/sites/docs/missing.css")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_deployment() {
    let fixture = Fixture::new(FakeRunner::default());
    let options = ServerOptions::default();

    let (status, body) = send(app(&fixture, &options), get("/api/deployments/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["message"], "Deployment not found: nope");

    // The event stream reports the miss as a single error event, then ends
    let (status, body) = send(app(&fixture, &options), get("/api/deployments/nope/events")).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("event: error"), "{}", text);
    assert!(text.contains("Deployment not found: nope"), "{}", text);
}

#[tokio::test]
async fn test_sites_can_be_disabled() {
    let fixture = Fixture::new(FakeRunner::default());
    fixture
        .blobs
        .put("sites/demo/index.html", Bytes::from_static(b"<p>demo</p>"), "text/html; charset=utf-8")
        .await
        .unwrap();

    let enabled = ServerOptions::default();
    let (status, _) = send(app(&fixture, &enabled), get("/sites/demo")).await;
    assert_eq!(status, StatusCode::OK);

    let disabled = ServerOptions {
        serve_sites: false,
        ..Default::default()
    };
    let (status, _) = send(app(&fixture, &disabled), get("/sites/demo")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
