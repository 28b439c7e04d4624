//! Thumbnail with a placeholder for missing images

use super::Renderer;
use tera::Context;
use trakure_core::Result;

/// Render a thumbnail
///
/// `exists` is the probe result: `None` while it is still running, which
/// shows a neutral placeholder rather than a broken image.
///
/// # Errors
///
/// Returns an error if the template fails to render.
pub fn render(
    renderer: &Renderer,
    url: Option<&str>,
    exists: Option<bool>,
    alt: &str,
) -> Result<String> {
    let state = match (url, exists) {
        (Some(_), Some(true)) => "present",
        (Some(_), None) => "checking",
        _ => "missing",
    };

    let mut context = Context::new();
    context.insert("state", state);
    context.insert("url", &url);
    context.insert("alt", alt);
    renderer.render("components/item_image.html", &context)
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("http://img/a.png"), Some(true), "<img")]
    #[case(Some("http://img/a.png"), Some(false), "No image")]
    #[case(Some("http://img/a.png"), None, "Checking image")]
    #[case(None, None, "No image")]
    fn test_image_states(
        #[case] url: Option<&str>,
        #[case] exists: Option<bool>,
        #[case] expected: &str,
    ) {
        let renderer = Renderer::new().unwrap();
        let html = render(&renderer, url, exists, "Panel").unwrap();

        assert!(html.contains(expected), "{html}");
    }
}
