//! HTTP control API
//!
//! Starts, stops and monitors the scrape job, and serves the scraped catalog
//! read-only.

pub mod handlers;
pub mod routes;
pub mod server;
pub mod types;

pub use handlers::{ApiError, AppState};
pub use routes::create_router;
pub use server::ApiServer;
