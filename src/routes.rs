//! Route definitions and router setup
//!
//! Exposes the change report as a task under `/dev/tasks`.

mod task;

use crate::state::SharedState;
use crate::store::ChangeStore;
use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router<S>(state: SharedState<S>) -> Router
where
    S: ChangeStore + Send + Sync + 'static,
{
    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .propagate_x_request_id();

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Tasks
        .route("/dev/tasks", get(task::list_tasks))
        .route("/dev/tasks/{slug}", get(task::run_task::<S>))
        // Apply middleware and state
        .layer(middleware)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
