//! Headline counter cards

use super::Renderer;
use serde::Serialize;
use tera::Context;
use trakure_core::{DashboardStats, Result};

#[derive(Debug, Serialize)]
struct Card {
    label: &'static str,
    value: u32,
    warn: bool,
}

/// Render one card per counter
///
/// Rework and long-waiting counts are highlighted once they are non-zero.
///
/// # Errors
///
/// Returns an error if the template fails to render.
pub fn render(renderer: &Renderer, stats: &DashboardStats) -> Result<String> {
    let cards = [
        Card {
            label: "Active items",
            value: stats.active_items,
            warn: false,
        },
        Card {
            label: "Active orders",
            value: stats.active_orders,
            warn: false,
        },
        Card {
            label: "In rework",
            value: stats.items_in_rework,
            warn: stats.items_in_rework > 0,
        },
        Card {
            label: "Waiting over 7 days",
            value: stats.items_waiting_over_7_days,
            warn: stats.items_waiting_over_7_days > 0,
        },
    ];

    let mut context = Context::new();
    context.insert("cards", &cards);
    renderer.render("components/stats_cards.html", &context)
}
