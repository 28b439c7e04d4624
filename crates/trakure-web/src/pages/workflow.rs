//! Workflow page: stage list and the items of the selected stage

use super::ready_state;
use crate::components::{Renderer, item_list, render_query, stage_list};
use crate::state::AppState;
use serde::Deserialize;
use tera::Context;
use trakure_core::Result;

/// Query string of `GET /workflow`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowParams {
    /// Identifier of the selected stage
    pub stage: Option<String>,
}

/// Render the workflow page
///
/// An unknown stage identifier renders like no selection.
///
/// # Errors
///
/// Returns an error if a subscription cannot be created or a template fails
/// to render. Fetch failures are rendered, not returned.
pub async fn render(state: &AppState, params: &WorkflowParams) -> Result<String> {
    let hooks = &state.hooks;
    let renderer: &Renderer = &state.renderer;
    let timeout = state.render_timeout();
    let selected_id = params.stage.as_deref().filter(|id| !id.is_empty());

    let mut stages = hooks.use_workflow_stages()?;
    let stages = ready_state(&mut stages, timeout).await;

    let stages_html = render_query(renderer, "workflow stages", &stages, |data| {
        stage_list::render(renderer, data, selected_id)
    })?;

    let selected = selected_id.and_then(|id| {
        stages
            .data
            .as_ref()
            .and_then(|data| data.iter().find(|stage| stage.id == id))
    });

    let items_html = match selected {
        Some(stage) => {
            let mut items = hooks.use_stage_items(stage.id.clone())?;
            let items = ready_state(&mut items, timeout).await;
            render_query(renderer, "stage items", &items, |data| {
                item_list::render(renderer, Some(stage), data)
            })?
        }
        None => item_list::render(renderer, None, &[])?,
    };

    let mut context = Context::new();
    context.insert("title", "Workflow");
    context.insert("active", "workflow");
    context.insert("stage_name", &selected.map(|stage| stage.name.as_str()));
    context.insert("stages", &stages_html);
    context.insert("items", &items_html);
    renderer.render("workflow.html", &context)
}
