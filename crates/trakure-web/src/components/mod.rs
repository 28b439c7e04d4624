//! Presentational components rendered with Tera
//!
//! Components are pure: they turn data (or a [`QueryState`]) into an HTML
//! fragment and never fetch anything themselves. Templates are compiled into
//! the binary and HTML auto-escaping applies to every `.html` template.

pub mod bottleneck_table;
pub mod error_message;
pub mod item_image;
pub mod item_list;
pub mod loading;
pub mod movement_chart;
pub mod stage_list;
pub mod stats_cards;

use crate::query::QueryState;
use std::error::Error as StdError;
use tera::{Context, Tera};
use trakure_core::{Error, Result};

const TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../../templates/layout.html")),
    ("dashboard.html", include_str!("../../templates/dashboard.html")),
    ("workflow.html", include_str!("../../templates/workflow.html")),
    ("not_found.html", include_str!("../../templates/not_found.html")),
    (
        "components/loading.html",
        include_str!("../../templates/components/loading.html"),
    ),
    (
        "components/error_message.html",
        include_str!("../../templates/components/error_message.html"),
    ),
    (
        "components/stale_notice.html",
        include_str!("../../templates/components/stale_notice.html"),
    ),
    (
        "components/stats_cards.html",
        include_str!("../../templates/components/stats_cards.html"),
    ),
    (
        "components/movement_chart.html",
        include_str!("../../templates/components/movement_chart.html"),
    ),
    (
        "components/bottleneck_table.html",
        include_str!("../../templates/components/bottleneck_table.html"),
    ),
    (
        "components/stage_list.html",
        include_str!("../../templates/components/stage_list.html"),
    ),
    (
        "components/empty_state.html",
        include_str!("../../templates/components/empty_state.html"),
    ),
    (
        "components/item_list.html",
        include_str!("../../templates/components/item_list.html"),
    ),
    (
        "components/item_image.html",
        include_str!("../../templates/components/item_image.html"),
    ),
];

/// Compiled page and component templates
#[derive(Debug, Clone)]
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Compile the embedded templates
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] if a template does not parse.
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())
            .map_err(|e| render_error(&e))?;

        Ok(Self { tera })
    }

    /// Render one template
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] if the template is unknown or rendering fails.
    pub fn render(&self, template: &str, context: &Context) -> Result<String> {
        self.tera
            .render(template, context)
            .map_err(|e| render_error(&e))
    }
}

/// Flatten a Tera error and its causes into one message
fn render_error(error: &tera::Error) -> Error {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    Error::Render(message)
}

/// Render the three-way outcome of a cached read
///
/// Data wins whenever there is some; a failed refresh then only adds a small
/// notice above it. Without data an error shows the error message, and
/// anything else shows the loading skeleton.
///
/// # Errors
///
/// Returns [`Error::Render`] if a template fails to render.
pub fn render_query<T>(
    renderer: &Renderer,
    label: &str,
    state: &QueryState<T>,
    render_data: impl FnOnce(&T) -> Result<String>,
) -> Result<String> {
    match (&state.data, &state.error) {
        (Some(data), Some(error)) => {
            let notice = error_message::render_stale_notice(renderer, error, state.updated_at)?;
            Ok(notice + &render_data(data)?)
        }
        (Some(data), None) => render_data(data),
        (None, Some(error)) => error_message::render(renderer, label, error),
        (None, None) => loading::render(renderer, label),
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn state_with(data: Option<u32>, error: Option<Error>) -> QueryState<u32> {
        let mut state = QueryState::idle();
        state.data = data;
        state.error = error.map(Arc::new);
        state
    }

    fn render_number(value: &u32) -> Result<String> {
        Ok(format!("<b>{value}</b>"))
    }

    #[test]
    fn test_templates_compile() {
        assert!(Renderer::new().is_ok());
    }

    #[test]
    fn test_unknown_template_is_render_error() {
        let renderer = Renderer::new().unwrap();
        let error = renderer.render("missing.html", &Context::new()).unwrap_err();
        assert!(matches!(error, Error::Render(_)));
    }

    #[test]
    fn test_render_query_loading() {
        let renderer = Renderer::new().unwrap();
        let html = render_query(&renderer, "stats", &state_with(None, None), render_number).unwrap();

        assert!(html.contains("Loading stats"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_render_query_error_without_data() {
        let renderer = Renderer::new().unwrap();
        let state = state_with(None, Some(Error::Timeout { duration_ms: 50 }));
        let html = render_query(&renderer, "stats", &state, render_number).unwrap();

        assert!(html.contains("Could not load stats"));
        assert!(html.contains("role=\"alert\""));
    }

    #[test]
    fn test_render_query_keeps_data_on_error() {
        let renderer = Renderer::new().unwrap();
        let state = state_with(Some(7), Some(Error::Timeout { duration_ms: 50 }));
        let html = render_query(&renderer, "stats", &state, render_number).unwrap();

        assert!(html.contains("<b>7</b>"));
        assert!(html.contains("Refresh failed"));
    }

    #[test]
    fn test_render_query_data() {
        let renderer = Renderer::new().unwrap();
        let html = render_query(&renderer, "stats", &state_with(Some(7), None), render_number).unwrap();

        assert_eq!(html, "<b>7</b>");
    }
}
