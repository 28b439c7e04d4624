//! Workflow stages with their sub-stages

use super::Renderer;
use serde::Serialize;
use tera::Context;
use trakure_core::{Result, WorkflowStage};

#[derive(Debug, Serialize)]
struct SubStageView<'a> {
    name: &'a str,
    location: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct StageView<'a> {
    name: &'a str,
    location: Option<&'a str>,
    href: String,
    selected: bool,
    sub_stages: Vec<SubStageView<'a>>,
}

/// Link that selects a stage on the workflow page
#[must_use]
pub fn stage_href(stage_id: &str) -> String {
    format!("/workflow?stage={}", urlencoding::encode(stage_id))
}

/// Render stages in the order given, sub-stages by `sequence_order`
///
/// # Errors
///
/// Returns an error if the template fails to render.
pub fn render(
    renderer: &Renderer,
    stages: &[WorkflowStage],
    selected: Option<&str>,
) -> Result<String> {
    let stages: Vec<StageView<'_>> = stages
        .iter()
        .map(|stage| StageView {
            name: &stage.name,
            location: stage.location.as_deref(),
            href: stage_href(&stage.id),
            selected: selected == Some(stage.id.as_str()),
            sub_stages: stage
                .ordered_sub_stages()
                .into_iter()
                .map(|sub| SubStageView {
                    name: &sub.name,
                    location: sub.location.as_deref(),
                })
                .collect(),
        })
        .collect();

    let mut context = Context::new();
    context.insert("stages", &stages);
    renderer.render("components/stage_list.html", &context)
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
mod tests {
    use super::*;
    use trakure_core::WorkflowSubStage;

    fn sub_stage(id: &str, name: &str, order: i32) -> WorkflowSubStage {
        WorkflowSubStage {
            id: id.to_string(),
            stage_id: "cut".to_string(),
            organization_id: "org".to_string(),
            name: name.to_string(),
            location: None,
            sequence_order: order,
        }
    }

    fn stage() -> WorkflowStage {
        WorkflowStage {
            id: "cut".to_string(),
            organization_id: "org".to_string(),
            name: "Cutting".to_string(),
            location: Some("Hall B".to_string()),
            sequence_order: 1,
            sub_stages: vec![
                sub_stage("s3", "Third", 3),
                sub_stage("s1", "First", 1),
                sub_stage("s2", "Second", 2),
            ],
        }
    }

    #[test]
    fn test_sub_stages_render_in_sequence_order() {
        let renderer = Renderer::new().unwrap();
        let html = render(&renderer, &[stage()], None).unwrap();

        let first = html.find("First").unwrap();
        let second = html.find("Second").unwrap();
        let third = html.find("Third").unwrap();
        assert!(first < second && second < third);
        assert!(html.contains("Hall B"));
    }

    #[test]
    fn test_selected_stage_is_marked() {
        let renderer = Renderer::new().unwrap();
        let html = render(&renderer, &[stage()], Some("cut")).unwrap();
        assert!(html.contains("class=\"selected\""));

        let html = render(&renderer, &[stage()], Some("sand")).unwrap();
        assert!(!html.contains("class=\"selected\""));
    }

    #[test]
    fn test_stage_href_is_encoded() {
        assert_eq!(stage_href("final check"), "/workflow?stage=final%20check");
    }

    #[test]
    fn test_no_stages() {
        let renderer = Renderer::new().unwrap();
        let html = render(&renderer, &[], None).unwrap();
        assert!(html.contains("No workflow stages"));
    }
}
