//! Route definitions for the web interface

use crate::{
    handlers::{api, pages},
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

/// Build the complete web application router
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Page routes
        .route("/", get(pages::dashboard))
        .route("/workflow", get(pages::workflow))
        // Cached JSON routes
        .route("/api/dashboard/stats", get(api::dashboard_stats))
        .route("/api/dashboard/bottleneck-items", get(api::bottleneck_items))
        .route("/api/dashboard/movement-stats", get(api::movement_stats))
        .route("/api/dashboard/refresh", post(api::refresh_dashboard))
        .route("/api/image-exists", get(api::image_exists))
        // Health check
        .route("/health", get(api::health_check))
        .fallback(pages::not_found)
}
