//! End-to-end pipeline tests with an in-memory blob store and a fake build runner

use sitedrop::blob::BlobStore;
use sitedrop::deploy::git::RepositoryRef;
use sitedrop::deploy::pipeline::DeploymentSource;
use sitedrop::jobs::store::JobStore;
use sitedrop_api::{ArchivePayload, SubmitDeploymentRequest};

use crate::support::{base64, zip_bytes, FakeRunner, Fixture};

fn archive_source(name: &str, entries: &[(&str, &str)]) -> DeploymentSource {
    let request = SubmitDeploymentRequest {
        archive: Some(ArchivePayload {
            name: name.to_string(),
            content_type: Some("application/zip".to_string()),
            data: base64(&zip_bytes(entries)),
        }),
        repository_url: None,
    };
    DeploymentSource::from_request(request, &[]).unwrap()
}

const VITE_MANIFEST: &str = r#"{
    "name": "shop",
    "scripts": { "build": "vite build" },
    "dependencies": { "react": "^18.0.0", "react-dom": "^18.0.0" },
    "devDependencies": { "vite": "^5.0.0", "@vitejs/plugin-react": "^4.0.0" }
}"#;

const NEXT_MANIFEST: &str = r#"{
    "name": "blog",
    "scripts": { "build": "next build" },
    "dependencies": { "next": "13.0.0", "react": "18.2.0", "react-dom": "18.2.0" }
}"#;

#[tokio::test]
async fn test_single_index_archive() {
    let fixture = Fixture::new(FakeRunner::default());
    let source = archive_source("hello.zip", &[("index.html", "<h1>hello</h1>")]);

    let id = fixture.pipeline.submit(source).await.unwrap();
    let job = fixture.finished(&id).await;
    let result = job.result.clone().unwrap();

    assert!(result.success, "{:?}", job.logs);
    assert_eq!(result.deployed_url.as_deref(), Some("/sites/hello"));
    assert_eq!(
        fixture.blobs.list("sites").await.unwrap(),
        vec!["sites/hello/index.html"]
    );
    assert!(job.logs.iter().any(|line| line == "Deployed to /sites/hello"));
}

#[tokio::test]
async fn test_static_archive_is_published_as_is() {
    let fixture = Fixture::new(FakeRunner::default());
    let source = archive_source(
        "My Portfolio.zip",
        &[
            ("portfolio/", ""),
            ("portfolio/index.html", "<h1>hello</h1>"),
            ("portfolio/css/site.css", "body {}"),
            ("portfolio/img/logo.svg", "<svg/>"),
        ],
    );

    let id = fixture.pipeline.submit(source).await.unwrap();
    let job = fixture.finished(&id).await;
    let result = job.result.clone().unwrap();

    assert!(result.success, "{:?}", job.logs);
    assert_eq!(job.status, "Completed Successfully");
    assert_eq!(result.project_name.as_deref(), Some("my-portfolio"));
    assert_eq!(result.deployed_url.as_deref(), Some("/sites/my-portfolio"));
    assert_eq!(result.message, "Deployed 3 files");
    assert!(result.error.is_none());

    let keys = fixture.blobs.list("sites/my-portfolio").await.unwrap();
    assert_eq!(
        keys,
        vec![
            "sites/my-portfolio/css/site.css",
            "sites/my-portfolio/img/logo.svg",
            "sites/my-portfolio/index.html",
        ]
    );
    let index = fixture.blobs.get("sites/my-portfolio/index.html").await.unwrap();
    assert_eq!(index.metadata.content_type, "text/html; charset=utf-8");

    // Static sites never reach the build runner
    assert!(fixture.runner.commands().is_empty());
    assert!(fixture.workspace_is_empty());
}

#[tokio::test]
async fn test_vite_project_is_built_with_base_path() {
    let fixture = Fixture::new(FakeRunner::default());
    let source = archive_source(
        "shop.zip",
        &[
            ("shop/package.json", VITE_MANIFEST),
            ("shop/index.html", "<div id=\"root\"></div>"),
            ("shop/src/main.jsx", "import React from 'react'"),
        ],
    );

    let id = fixture.pipeline.submit(source).await.unwrap();
    let job = fixture.finished(&id).await;
    let result = job.result.clone().unwrap();

    assert!(result.success, "{:?}", job.logs);
    assert_eq!(result.message, "Deployed 2 files");
    assert_eq!(
        fixture.runner.commands(),
        vec!["npm install", "npm run build -- --base /sites/shop/"]
    );

    // Only the build output is published, never the sources
    let keys = fixture.blobs.list("sites/shop").await.unwrap();
    assert_eq!(keys, vec!["sites/shop/assets/app.js", "sites/shop/index.html"]);

    // Command output is streamed into the job log
    assert!(job.logs.iter().any(|line| line == "$ npm install"));
    assert!(job.logs.iter().any(|line| line.starts_with("Detected vite-react")));
    assert!(fixture.workspace_is_empty());
}

#[tokio::test]
async fn test_build_failure_is_reported_and_cleaned_up() {
    let fixture = Fixture::new(FakeRunner::failing());
    let source = archive_source("blog.zip", &[("package.json", NEXT_MANIFEST)]);

    let id = fixture.pipeline.submit(source).await.unwrap();
    let job = fixture.finished(&id).await;
    let result = job.result.clone().unwrap();

    assert!(!result.success);
    assert_eq!(job.status, "Failed");
    assert_eq!(result.project_name.as_deref(), Some("blog"));
    assert!(result.deployed_url.is_none());
    let error = result.error.unwrap();
    assert!(error.starts_with("BuildFailedError: "), "{}", error);
    assert!(error.contains("cannot find module"), "{}", error);
    assert!(job
        .logs
        .iter()
        .any(|line| line.starts_with("Deployment failed during Building phase: ")));

    assert!(fixture.blobs.list("sites").await.unwrap().is_empty());
    assert!(fixture.workspace_is_empty());
}

#[tokio::test]
async fn test_nextjs_build_falls_back_to_export_directory() {
    let fixture = Fixture::new(FakeRunner::writing_to("out"));
    let source = archive_source(
        "blog.zip",
        &[("package.json", NEXT_MANIFEST), ("pages/index.js", "export default () => null")],
    );

    let id = fixture.pipeline.submit(source).await.unwrap();
    let job = fixture.finished(&id).await;
    let result = job.result.clone().unwrap();

    assert!(result.success, "{:?}", job.logs);
    assert_eq!(result.deployed_url.as_deref(), Some("/sites/blog"));
    assert_eq!(fixture.runner.commands(), vec!["npm install", "npm run build"]);
    assert_eq!(
        fixture.runner.last_env(),
        vec![("PUBLIC_URL".to_string(), "/sites/blog".to_string())]
    );

    assert!(job.logs.iter().any(|line| line.starts_with("Notice: nextjs serves from /sites/blog")));
    assert!(job
        .logs
        .iter()
        .any(|line| line == "Output directory .next not found, using out instead"));

    let keys = fixture.blobs.list("sites/blog").await.unwrap();
    assert_eq!(keys, vec!["sites/blog/assets/app.js", "sites/blog/index.html"]);
    assert!(fixture.workspace_is_empty());
}

#[tokio::test]
async fn test_failed_clone_is_reported_and_cleaned_up() {
    let fixture = Fixture::new(FakeRunner::default());
    let missing = fixture.workspace.path().join("no-such-repo.git");
    let source = DeploymentSource::Repository(RepositoryRef {
        url: format!("file://{}", missing.display()),
        host: "localhost".to_string(),
        owner: "acme".to_string(),
        repo: "landing-page".to_string(),
    });

    let id = fixture.pipeline.submit(source).await.unwrap();
    let job = fixture.finished(&id).await;
    let result = job.result.clone().unwrap();

    assert!(!result.success);
    assert_eq!(job.status, "Failed");
    assert_eq!(result.project_name.as_deref(), Some("landing-page"));
    let error = result.error.unwrap();
    assert!(error.starts_with("SourceFetchError: "), "{}", error);
    assert!(job
        .logs
        .iter()
        .any(|line| line.starts_with("Deployment failed during Extracting phase: ")));

    assert!(fixture.runner.commands().is_empty());
    assert!(fixture.workspace_is_empty());
}

#[tokio::test]
async fn test_missing_build_output_lists_project_contents() {
    let fixture = Fixture::new(FakeRunner::without_output());
    let source = archive_source(
        "shop.zip",
        &[("package.json", VITE_MANIFEST), ("src/main.jsx", "")],
    );

    let id = fixture.pipeline.submit(source).await.unwrap();
    let result = fixture.finished(&id).await.result.unwrap();

    let error = result.error.unwrap();
    assert!(error.starts_with("OutputDirectoryNotFoundError: "), "{}", error);
    assert!(error.contains("package.json"), "{}", error);
    assert!(fixture.workspace_is_empty());
}

#[tokio::test]
async fn test_archive_without_files_fails() {
    let fixture = Fixture::new(FakeRunner::default());
    let source = archive_source("empty.zip", &[("docs/", ""), ("docs/img/", "")]);

    let id = fixture.pipeline.submit(source).await.unwrap();
    let job = fixture.finished(&id).await;
    let result = job.result.unwrap();

    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("EmptyArchiveError: "));
    assert!(fixture.workspace_is_empty());
}

#[tokio::test]
async fn test_run_records_exactly_one_result() {
    let fixture = Fixture::new(FakeRunner::default());
    let source = archive_source("one.zip", &[("index.html", "<p>one</p>")]);

    let id = fixture.jobs.create().await.unwrap();
    let result = fixture.pipeline.clone().run(id.clone(), source).await;

    let job = fixture.jobs.get(&id).await.unwrap();
    assert!(job.is_done);
    assert_eq!(job.result, Some(result.clone()));

    // A finished job refuses further writes
    assert!(fixture.jobs.complete(&id, result).await.is_err());
    assert!(fixture.jobs.append_log(&id, "late".to_string()).await.is_err());
}
