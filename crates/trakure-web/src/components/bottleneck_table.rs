//! Items that have sat in one stage the longest

use super::{Renderer, item_image};
use serde::Serialize;
use std::collections::HashMap;
use tera::Context;
use trakure_core::{BottleneckItem, Result};

#[derive(Debug, Serialize)]
struct Row<'a> {
    image: String,
    item_name: &'a str,
    order_number: Option<&'a str>,
    stage: String,
    days_in_stage: u32,
    is_rework: bool,
}

/// "Stage / Sub-stage", or whichever part is known
fn stage_label(item: &BottleneckItem) -> String {
    match (item.stage_name.as_deref(), item.sub_stage_name.as_deref()) {
        (Some(stage), Some(sub)) => format!("{stage} / {sub}"),
        (Some(name), None) | (None, Some(name)) => name.to_string(),
        (None, None) => String::new(),
    }
}

/// Render the table in server order
///
/// `images` maps image URLs to their probe results; URLs missing from it
/// render as "checking".
///
/// # Errors
///
/// Returns an error if a template fails to render.
pub fn render(
    renderer: &Renderer,
    items: &[BottleneckItem],
    images: &HashMap<String, bool>,
) -> Result<String> {
    let rows = items
        .iter()
        .map(|item| {
            let url = item.image_url.as_deref();
            let exists = url.and_then(|url| images.get(url).copied());
            Ok(Row {
                image: item_image::render(renderer, url, exists, &item.item_name)?,
                item_name: &item.item_name,
                order_number: item.order_number.as_deref(),
                stage: stage_label(item),
                days_in_stage: item.days_in_stage,
                is_rework: item.is_rework,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut context = Context::new();
    context.insert("rows", &rows);
    renderer.render("components/bottleneck_table.html", &context)
}
