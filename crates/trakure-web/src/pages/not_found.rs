//! Page for unknown paths

use crate::components::Renderer;
use tera::Context;
use trakure_core::Result;

/// Render the not-found page for `path`
///
/// # Errors
///
/// Returns an error if the template fails to render.
pub fn render(renderer: &Renderer, path: &str) -> Result<String> {
    let mut context = Context::new();
    context.insert("title", "Not found");
    context.insert("active", "");
    context.insert("path", path);
    renderer.render("not_found.html", &context)
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_escaped() {
        let renderer = Renderer::new().unwrap();
        let html = render(&renderer, "/<b>nope</b>").unwrap();

        assert!(html.contains("Page not found"));
        assert!(html.contains("&lt;b&gt;nope"));
    }
}
