//! Error display for failed reads

use super::Renderer;
use chrono::{DateTime, Utc};
use tera::Context;
use trakure_core::{Error, Result};

/// Render the error shown in place of a widget that has no data
///
/// # Errors
///
/// Returns an error if the template fails to render.
pub fn render(renderer: &Renderer, label: &str, error: &Error) -> Result<String> {
    let mut context = Context::new();
    context.insert("label", label);
    context.insert("message", &describe(error));
    renderer.render("components/error_message.html", &context)
}

/// Render the note shown above cached data after a failed refresh
///
/// # Errors
///
/// Returns an error if the template fails to render.
pub fn render_stale_notice(
    renderer: &Renderer,
    error: &Error,
    updated_at: Option<DateTime<Utc>>,
) -> Result<String> {
    let updated_at = updated_at.map_or_else(
        || "an earlier load".to_string(),
        |at| at.format("%Y-%m-%d %H:%M UTC").to_string(),
    );

    let mut context = Context::new();
    context.insert("message", &describe(error));
    context.insert("updated_at", &updated_at);
    renderer.render("components/stale_notice.html", &context)
}

/// Short, user-facing wording for an error
fn describe(error: &Error) -> String {
    match error {
        Error::Timeout { .. } => "The server took too long to answer.".to_string(),
        Error::Network { .. } => "The server could not be reached.".to_string(),
        Error::RequestFailed { status, .. } => format!("The server answered with status {status}."),
        Error::ParseFailed { .. } | Error::Validation { .. } => {
            "The server sent data that could not be read.".to_string()
        }
        Error::NotFound { .. } => "The requested data does not exist.".to_string(),
        other => other.to_string(),
    }
}
