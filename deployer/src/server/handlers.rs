//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::{Stream, StreamExt};
use sitedrop_api::{
    DeploymentSnapshotResponse, ErrorResponse, HealthResponse, SubmitDeploymentRequest,
    SubmitDeploymentResponse, VersionResponse,
};
use tracing::{error, warn};

use crate::blob::{join_key, BlobError};
use crate::deploy::naming::site_prefix;
use crate::deploy::pipeline::DeploymentSource;
use crate::jobs::stream::progress_stream;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "sitedrop".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Submit a deployment. Invalid submissions are rejected without creating a job.
pub async fn submit_handler(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<SubmitDeploymentRequest>, JsonRejection>,
) -> (StatusCode, Json<SubmitDeploymentResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected submission: {}", rejection.body_text());
            let status = match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return (status, Json(SubmitDeploymentResponse::rejected(rejection.body_text())));
        }
    };

    let source = match DeploymentSource::from_request(request, &state.allowed_hosts) {
        Ok(source) => source,
        Err(e) => {
            warn!("Rejected submission: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(SubmitDeploymentResponse::rejected(e.to_string())),
            );
        }
    };

    match state.pipeline.submit(source).await {
        Ok(id) => (StatusCode::ACCEPTED, Json(SubmitDeploymentResponse::accepted(id))),
        Err(e) => {
            error!("Failed to start deployment: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SubmitDeploymentResponse::rejected("Failed to start deployment")),
            )
        }
    }
}

/// Point-in-time view of a deployment
pub async fn snapshot_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<DeploymentSnapshotResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.jobs.get(&id).await {
        Some(job) => Ok(Json(job.into())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                message: format!("Deployment not found: {}", id),
            }),
        )),
    }
}

/// Server-sent progress events for a deployment
pub async fn events_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = progress_stream(state.jobs.clone(), id, state.poll_interval).map(|event| event.to_sse());

    Sse::new(stream).keep_alive(KeepAlive::new().interval(state.keep_alive))
}

/// `GET /sites/{project}`
pub async fn site_index_handler(
    State(state): State<Arc<ServerState>>,
    Path(project): Path<String>,
) -> Response {
    serve_site(&state, &project, "").await
}

/// `GET /sites/{project}/{*path}`
pub async fn site_handler(
    State(state): State<Arc<ServerState>>,
    Path((project, path)): Path<(String, String)>,
) -> Response {
    serve_site(&state, &project, &path).await
}

/// Blob keys to try for a request path, in order
pub fn site_keys(project: &str, path: &str) -> Result<Vec<String>, BlobError> {
    let prefix = site_prefix(project);
    let last_segment = path.rsplit('/').next().unwrap_or("");

    if path.is_empty() || path.ends_with('/') {
        return Ok(vec![join_key(&prefix, &format!("{}/index.html", path))?]);
    }

    if !last_segment.contains('.') {
        return Ok(vec![
            join_key(&prefix, &format!("{}/index.html", path))?,
            join_key(&prefix, path)?,
        ]);
    }

    Ok(vec![join_key(&prefix, path)?])
}

async fn serve_site(state: &ServerState, project: &str, path: &str) -> Response {
    let keys = match site_keys(project, path) {
        Ok(keys) => keys,
        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid path").into_response(),
    };

    for key in &keys {
        match state.blobs.get(key).await {
            Ok(object) => {
                return Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, object.metadata.content_type)
                    .header(header::CONTENT_LENGTH, object.metadata.size)
                    .body(Body::from(object.bytes))
                    .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
            }
            Err(BlobError::NotFound(_)) => continue,
            Err(e) => {
                error!("Failed to read {}: {}", key, e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    (StatusCode::NOT_FOUND, "Not found").into_response()
}

/// Fallback for unknown routes
pub async fn not_found_handler() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            message: "Not found".to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_keys() {
        assert_eq!(site_keys("demo", "").unwrap(), vec!["sites/demo/index.html"]);
        assert_eq!(site_keys("demo", "docs/").unwrap(), vec!["sites/demo/docs/index.html"]);
        assert_eq!(
            site_keys("demo", "about").unwrap(),
            vec!["sites/demo/about/index.html", "sites/demo/about"]
        );
        assert_eq!(site_keys("demo", "assets/app.js").unwrap(), vec!["sites/demo/assets/app.js"]);
        assert!(site_keys("demo", "../other/index.html").is_err());
    }
}
