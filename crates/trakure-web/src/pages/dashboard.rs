//! Dashboard page: headline counters, movement and bottlenecks

use super::ready_state;
use crate::components::{
    Renderer, bottleneck_table, movement_chart, render_query, stats_cards,
};
use crate::state::AppState;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use tera::Context;
use tracing::debug;
use trakure_core::{BottleneckItem, Result};

/// Query string of `GET /`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DashboardParams {
    /// Movement window in days
    pub days: Option<u32>,
    /// Number of bottleneck items
    pub limit: Option<u32>,
}

/// Probe every distinct image of the bottleneck list
///
/// Probes still running after `timeout` are left out and render as
/// "checking"; their results land in the cache for the next request.
async fn probe_images(
    state: &AppState,
    items: &[BottleneckItem],
) -> Result<HashMap<String, bool>> {
    let urls: BTreeSet<&str> = items
        .iter()
        .filter_map(|item| item.image_url.as_deref())
        .collect();

    let mut probes = urls
        .into_iter()
        .map(|url| Ok((url.to_string(), state.hooks.use_image_exists(url)?)))
        .collect::<Result<Vec<_>>>()?;

    let timeout = state.render_timeout();
    let results = join_all(
        probes
            .iter_mut()
            .map(|(_, subscription)| ready_state(subscription, timeout)),
    )
    .await;

    Ok(probes
        .into_iter()
        .zip(results)
        .filter_map(|((url, _), probe)| probe.data.map(|exists| (url, exists)))
        .collect())
}

/// Render the dashboard
///
/// # Errors
///
/// Returns an error if a subscription cannot be created or a template fails
/// to render. Fetch failures are rendered, not returned.
pub async fn render(state: &AppState, params: DashboardParams) -> Result<String> {
    let hooks = &state.hooks;
    let renderer: &Renderer = &state.renderer;
    let timeout = state.render_timeout();
    let days = hooks.movement_days(params.days);

    let mut stats = hooks.use_dashboard_stats()?;
    let mut movement = hooks.use_movement_stats(Some(days))?;
    let mut bottlenecks = hooks.use_bottleneck_items(params.limit)?;

    let (stats, movement, bottlenecks) = tokio::join!(
        ready_state(&mut stats, timeout),
        ready_state(&mut movement, timeout),
        ready_state(&mut bottlenecks, timeout),
    );

    let images = match &bottlenecks.data {
        Some(items) => probe_images(state, items).await?,
        None => HashMap::new(),
    };
    debug!(
        days,
        stats = %stats.status,
        movement = %movement.status,
        bottlenecks = %bottlenecks.status,
        images = images.len(),
        "Rendering dashboard"
    );

    let mut context = Context::new();
    context.insert("title", "Dashboard");
    context.insert("active", "dashboard");
    context.insert("days", &days);
    context.insert(
        "stats",
        &render_query(renderer, "dashboard stats", &stats, |data| {
            stats_cards::render(renderer, data)
        })?,
    );
    context.insert(
        "movement",
        &render_query(renderer, "movement", &movement, |data| {
            movement_chart::render(renderer, data)
        })?,
    );
    context.insert(
        "bottlenecks",
        &render_query(renderer, "bottlenecks", &bottlenecks, |data| {
            bottleneck_table::render(renderer, data, &images)
        })?,
    );

    renderer.render("dashboard.html", &context)
}
