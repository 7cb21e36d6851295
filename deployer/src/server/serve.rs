//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::DeployError;
use crate::server::handlers::{
    events_handler, health_handler, not_found_handler, site_handler, site_index_handler,
    snapshot_handler, submit_handler, version_handler,
};
use crate::server::state::ServerState;

/// Build the application router
pub fn router(options: &ServerOptions, state: Arc<ServerState>) -> Router {
    let mut app = Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Deployments
        .route(
            "/api/deployments",
            post(submit_handler).layer(DefaultBodyLimit::max(options.max_upload_bytes)),
        )
        .route("/api/deployments/{id}", get(snapshot_handler))
        .route("/api/deployments/{id}/events", get(events_handler));

    if options.serve_sites {
        app = app
            .route("/sites/{project}", get(site_index_handler))
            .route("/sites/{project}/", get(site_index_handler))
            .route("/sites/{project}/{*path}", get(site_handler));
    }

    app.fallback(not_found_handler)
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), DeployError>>, DeployError> {
    let app = router(options, state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| DeployError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| DeployError::ServerError(e.to_string()))
    });

    Ok(handle)
}
