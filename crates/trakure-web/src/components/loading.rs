//! Loading skeleton shown until a first fetch completes

use super::Renderer;
use tera::Context;
use trakure_core::Result;

/// Render the skeleton for a widget named `label`
///
/// # Errors
///
/// Returns an error if the template fails to render.
pub fn render(renderer: &Renderer, label: &str) -> Result<String> {
    let mut context = Context::new();
    context.insert("label", label);
    renderer.render("components/loading.html", &context)
}
