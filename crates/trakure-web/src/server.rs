//! Web server setup and configuration

use crate::{routes::build_routes, state::AppState};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use trakure_core::{Config, Result};

/// Build the complete web application with all routes and state
///
/// Mounts the default dashboard queries, so it must be called inside a tokio
/// runtime.
///
/// # Errors
///
/// Returns an error if the application state cannot be created.
pub fn build_app(config: Config) -> Result<Router> {
    let state = Arc::new(AppState::new(config)?);

    Ok(build_routes()
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http())))
}
