//! Items waiting in the selected stage
//!
//! This is the one component with its own branching: what it shows when
//! there is nothing to list depends on whether a stage is selected at all.

use super::Renderer;
use serde::Serialize;
use tera::Context;
use trakure_core::{Result, WorkItem, WorkflowStage};

/// Shown before any stage is picked
pub const NO_STAGE_SELECTED_MESSAGE: &str = "Select a stage to view its items";
/// Shown for a selected stage with nothing in it
pub const EMPTY_STAGE_MESSAGE: &str = "No items are waiting in this stage";

#[derive(Debug, Serialize)]
struct ItemView<'a> {
    name: &'a str,
    order_number: Option<&'a str>,
    sub_stage: Option<&'a str>,
    entered: Option<String>,
}

/// Render the empty-state placeholder
///
/// # Errors
///
/// Returns an error if the template fails to render.
pub fn render_empty_state(renderer: &Renderer, message: &str) -> Result<String> {
    let mut context = Context::new();
    context.insert("message", message);
    renderer.render("components/empty_state.html", &context)
}

/// Render the items of `selected`, or the matching empty state
///
/// # Errors
///
/// Returns an error if a template fails to render.
pub fn render(
    renderer: &Renderer,
    selected: Option<&WorkflowStage>,
    items: &[WorkItem],
) -> Result<String> {
    let Some(stage) = selected else {
        return render_empty_state(renderer, NO_STAGE_SELECTED_MESSAGE);
    };
    if items.is_empty() {
        return render_empty_state(renderer, EMPTY_STAGE_MESSAGE);
    }

    let items: Vec<ItemView<'_>> = items
        .iter()
        .map(|item| ItemView {
            name: &item.name,
            order_number: item.order_number.as_deref(),
            sub_stage: item.sub_stage_id.as_deref().and_then(|id| {
                stage
                    .sub_stages
                    .iter()
                    .find(|sub| sub.id == id)
                    .map(|sub| sub.name.as_str())
            }),
            entered: item
                .entered_stage_at
                .map(|at| at.format("%Y-%m-%d").to_string()),
        })
        .collect();

    let mut context = Context::new();
    context.insert("items", &items);
    renderer.render("components/item_list.html", &context)
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
mod tests {
    use super::*;
    use trakure_core::WorkflowSubStage;

    fn stage() -> WorkflowStage {
        WorkflowStage {
            id: "sand".to_string(),
            organization_id: "org".to_string(),
            name: "Sanding".to_string(),
            location: None,
            sequence_order: 2,
            sub_stages: vec![WorkflowSubStage {
                id: "rough".to_string(),
                stage_id: "sand".to_string(),
                organization_id: "org".to_string(),
                name: "Rough grit".to_string(),
                location: None,
                sequence_order: 1,
            }],
        }
    }

    fn item(name: &str) -> WorkItem {
        WorkItem {
            id: name.to_lowercase(),
            name: name.to_string(),
            order_number: Some("PO-7".to_string()),
            stage_id: "sand".to_string(),
            sub_stage_id: Some("rough".to_string()),
            entered_stage_at: None,
        }
    }

    #[test]
    fn test_no_stage_selected() {
        let renderer = Renderer::new().unwrap();
        let html = render(&renderer, None, &[item("Panel")]).unwrap();

        assert!(html.contains(NO_STAGE_SELECTED_MESSAGE));
        assert!(!html.contains("Panel"));
    }

    #[test]
    fn test_selected_stage_without_items() {
        let renderer = Renderer::new().unwrap();
        let stage = stage();
        let html = render(&renderer, Some(&stage), &[]).unwrap();

        assert!(html.contains(EMPTY_STAGE_MESSAGE));
        assert!(!html.contains(NO_STAGE_SELECTED_MESSAGE));
    }

    #[test]
    fn test_items_resolve_sub_stage_names() {
        let renderer = Renderer::new().unwrap();
        let stage = stage();
        let html = render(&renderer, Some(&stage), &[item("Panel"), item("Door")]).unwrap();

        assert!(html.contains("Panel"));
        assert!(html.contains("Door"));
        assert!(html.contains("Rough grit"));
        assert!(html.contains("PO-7"));
    }
}
