use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Liveness and metrics
        .route("/health", get(handlers::liveness_handler))
        .route("/metrics", get(handlers::metrics_handler))
        // System endpoints
        .route("/api/system/health", get(handlers::get_system_health))
        // Healing endpoints
        .route("/api/healing/events", get(handlers::get_events))
        .route(
            "/api/healing/trigger/:name",
            post(handlers::trigger_remediation),
        )
        // Dependency endpoints
        .route(
            "/api/dependencies",
            get(handlers::list_dependencies).post(handlers::register_dependency),
        )
        .route(
            "/api/dependencies/:name",
            delete(handlers::deregister_dependency),
        )
        .route(
            "/api/dependencies/:name/reset",
            post(handlers::reset_breaker),
        )
        // Add state and CORS
        .with_state(state)
        .layer(cors)
}
