//! Page handlers serving rendered HTML

use crate::pages::{self, dashboard::DashboardParams, workflow::WorkflowParams};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;
use trakure_core::Result;

const RENDER_FAILED_PAGE: &str =
    "<!DOCTYPE html><html><body><h1>Something went wrong</h1><p>The page could not be rendered.</p></body></html>";

fn html_response(status: StatusCode, page: &str, rendered: Result<String>) -> Response {
    match rendered {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!(page, error = %e, "Failed to render page");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(RENDER_FAILED_PAGE)).into_response()
        }
    }
}

/// Dashboard page
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DashboardParams>,
) -> Response {
    let rendered = pages::dashboard::render(&state, params).await;
    html_response(StatusCode::OK, "dashboard", rendered)
}

/// Workflow page
pub async fn workflow(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WorkflowParams>,
) -> Response {
    let rendered = pages::workflow::render(&state, &params).await;
    html_response(StatusCode::OK, "workflow", rendered)
}

/// Fallback for unknown paths
pub async fn not_found(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let rendered = pages::not_found::render(&state.renderer, uri.path());
    html_response(StatusCode::NOT_FOUND, "not_found", rendered)
}
