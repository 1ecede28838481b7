//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        // Workflows
        .route(
            "/workflows",
            get(handlers::list_workflows).post(handlers::apply_workflow),
        )
        .route(
            "/namespaces/:namespace/workflows",
            get(handlers::list_namespaced_workflows).delete(handlers::delete_workflows),
        )
        .route(
            "/namespaces/:namespace/workflows/:name",
            get(handlers::get_workflow).delete(handlers::delete_workflow),
        )
        // Jobs
        .route("/jobs", get(handlers::list_jobs))
        .route(
            "/namespaces/:namespace/jobs",
            get(handlers::list_namespaced_jobs).delete(handlers::delete_jobs),
        )
        .route(
            "/namespaces/:namespace/jobs/:name",
            get(handlers::get_job).delete(handlers::delete_job),
        )
        // Events
        .route("/events", get(handlers::get_events))
        .route("/events/stream", get(handlers::stream_events))
        // Manifests
        .route("/apply", post(handlers::apply_manifests));

    // Build router with middleware
    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
