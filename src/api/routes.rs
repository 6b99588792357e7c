//! HTTP API Route Definitions
//!
//! Defines the control and catalog routes.

use axum::{
    http::Method,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};

/// Create the API router with all routes
pub fn create_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // Job control
        .route("/scraper/start", post(handlers::start_scraper))
        .route("/scraper/stop", post(handlers::stop_scraper))
        .route("/scraper/status", get(handlers::scraper_status))
        .route("/scraper/progress", get(handlers::scraper_progress))
        .route("/scraper/logs", get(handlers::scraper_logs))
        .route("/scraper/cleanup", delete(handlers::cleanup_blobs))
        // Catalog
        .route("/medicines", get(handlers::list_medicines))
        .route("/medicines/:id", get(handlers::get_medicine))
        .route("/stats", get(handlers::stats))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
