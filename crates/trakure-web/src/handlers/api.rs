//! JSON endpoints served from the query cache

use crate::query::{QueryData, Subscription};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::identity;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Response header carrying the status of the cached read
pub const QUERY_STATUS_HEADER: &str = "x-query-status";

/// Query string of the bottleneck proxy
#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    /// Number of items
    pub limit: Option<u32>,
}

/// Query string of the movement proxy
#[derive(Debug, Default, Deserialize)]
pub struct DaysParams {
    /// Window length in days
    pub days: Option<u32>,
}

/// Query string of the image probe
#[derive(Debug, Deserialize)]
pub struct ImageParams {
    /// Image URL of a cached bottleneck item
    pub url: String,
}

/// Answer from the cache
///
/// Data is returned whenever some is cached, even if the latest refresh
/// failed. With no data, a failure is a `502` and a first load that outlasts
/// `timeout` is a `504`. Upstream error details are logged, not returned.
/// `shape` turns cached data into the response body.
async fn cached_json<T, B>(
    mut subscription: Subscription<T>,
    timeout: Duration,
    shape: impl FnOnce(T) -> B,
) -> Response
where
    T: QueryData,
    B: Serialize,
{
    let key = subscription.key().to_string();
    let Some(state) = subscription.ready_within(timeout).await else {
        warn!(
            key = %key,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "First load timed out"
        );
        return (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({ "error": "timeout", "key": key })),
        )
            .into_response();
    };

    let status = state.status.to_string();
    match (state.data, state.error) {
        (Some(data), _) => (
            StatusCode::OK,
            [(QUERY_STATUS_HEADER, status)],
            Json(shape(data)),
        )
            .into_response(),
        (None, Some(e)) => {
            error!(key = %key, error = %e, "No cached data to serve");
            (
                StatusCode::BAD_GATEWAY,
                [(QUERY_STATUS_HEADER, status)],
                Json(json!({ "error": "upstream_failed", "key": key })),
            )
                .into_response()
        }
        (None, None) => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({ "error": "timeout", "key": key })),
        )
            .into_response(),
    }
}

fn subscription_failed(e: &trakure_core::Error) -> Response {
    error!(error = %e, "Failed to subscribe");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal", "message": e.to_string() })),
    )
        .into_response()
}

/// Headline counters
pub async fn dashboard_stats(State(state): State<Arc<AppState>>) -> Response {
    match state.hooks.use_dashboard_stats() {
        Ok(subscription) => cached_json(subscription, state.render_timeout(), identity).await,
        Err(e) => subscription_failed(&e),
    }
}

/// Bottleneck list
pub async fn bottleneck_items(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Response {
    match state.hooks.use_bottleneck_items(params.limit) {
        Ok(subscription) => cached_json(subscription, state.render_timeout(), identity).await,
        Err(e) => subscription_failed(&e),
    }
}

/// Movement series
pub async fn movement_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DaysParams>,
) -> Response {
    match state.hooks.use_movement_stats(params.days) {
        Ok(subscription) => cached_json(subscription, state.render_timeout(), identity).await,
        Err(e) => subscription_failed(&e),
    }
}

/// Whether a bottleneck item's image resolves, as `{ "exists": bool }`
///
/// Only image URLs listed by cached bottleneck items are probed.
pub async fn image_exists(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ImageParams>,
) -> Response {
    let url = params.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_url",
                "message": "url must be an absolute http(s) URL",
            })),
        )
            .into_response();
    }

    // The default bottleneck list is mounted, so this is normally a cache hit.
    if let Ok(mut bottlenecks) = state.hooks.use_bottleneck_items(None) {
        let _ = bottlenecks.ready_within(state.render_timeout()).await;
    }
    if !state.hooks.is_known_image(url) {
        warn!(url, "Refusing to probe an image no bottleneck item lists");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "unknown_image",
                "message": "url is not the image of a listed bottleneck item",
            })),
        )
            .into_response();
    }

    match state.hooks.use_image_exists(url) {
        Ok(subscription) => {
            cached_json(subscription, state.render_timeout(), |exists| {
                json!({ "exists": exists })
            })
            .await
        }
        Err(e) => subscription_failed(&e),
    }
}

/// Mark the dashboard widgets stale so they refetch
pub async fn refresh_dashboard(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let invalidated = state.hooks.refresh_dashboard();
    info!(invalidated, "Dashboard refresh requested");
    Json(json!({ "invalidated": invalidated }))
}

/// Health check with the number of cached queries
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "cached_queries": state.query_client().len(),
    }))
}
