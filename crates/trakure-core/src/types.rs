//! Core data types for the Trakure dashboard
//!
//! These are the records returned by the Trakure API. The dashboard never owns
//! their lifecycle; it decodes, validates and caches them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// Headline counters shown at the top of the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Items currently moving through the workflow
    pub active_items: u32,
    /// Orders with at least one active item
    pub active_orders: u32,
    /// Items sent back for rework
    pub items_in_rework: u32,
    /// Items that have not moved for more than seven days
    #[serde(rename = "itemsWaitingOver7Days")]
    pub items_waiting_over_7_days: u32,
}

/// One day of movement through the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementStatsData {
    /// Calendar day (ISO-8601 date)
    pub date: NaiveDate,
    /// Items moved forward to a later stage that day
    pub forward: u32,
    /// Items sent back for rework that day
    pub rework: u32,
}

impl MovementStatsData {
    /// Total movements recorded for the day
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.forward as u64 + self.rework as u64
    }
}

/// Check that a movement series is in chronological order with one entry per day.
///
/// # Errors
///
/// Returns [`crate::Error::Validation`] if a date repeats or goes backwards.
pub fn validate_movement_series(points: &[MovementStatsData]) -> crate::Result<()> {
    for pair in points.windows(2) {
        if let [previous, next] = pair
            && next.date <= previous.date
        {
            return Err(crate::Error::Validation {
                field: "date".to_string(),
                message: format!(
                    "movement series is not chronological: {} follows {}",
                    next.date, previous.date
                ),
            });
        }
    }
    Ok(())
}

/// A workflow item the server flagged as stuck at a stage
///
/// The server owns this shape, so every field is optional on the wire; fields
/// the dashboard does not render are kept in `extra` so they survive a round
/// trip through the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BottleneckItem {
    /// Item identifier
    #[serde(default)]
    pub id: String,
    /// Display name of the item
    #[serde(default)]
    pub item_name: String,
    /// Order the item belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    /// Stage the item is waiting in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_name: Option<String>,
    /// Sub-stage the item is waiting in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_stage_name: Option<String>,
    /// Days since the item entered its current stage
    #[serde(default)]
    pub days_in_stage: u32,
    /// Whether the item is in rework
    #[serde(default)]
    pub is_rework: bool,
    /// Optional product image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Any other fields the server sent
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A top-level workflow stage and its ordered sub-stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_stage_hierarchy"))]
pub struct WorkflowStage {
    /// Stage identifier
    #[validate(length(min = 1))]
    pub id: String,
    /// Owning organization
    pub organization_id: String,
    /// Display name
    #[validate(length(min = 1))]
    pub name: String,
    /// Free-text location of the stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Display position among stages
    #[serde(default)]
    pub sequence_order: i32,
    /// Child steps of this stage
    #[serde(default)]
    #[validate(nested)]
    pub sub_stages: Vec<WorkflowSubStage>,
}

/// A child step nested under a [`WorkflowStage`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct WorkflowSubStage {
    /// Sub-stage identifier
    #[validate(length(min = 1))]
    pub id: String,
    /// Owning stage
    pub stage_id: String,
    /// Owning organization
    pub organization_id: String,
    /// Display name
    #[validate(length(min = 1))]
    pub name: String,
    /// Free-text location of the sub-stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Display position within the stage; not required to be unique
    #[serde(default)]
    pub sequence_order: i32,
}

impl WorkflowStage {
    /// Sub-stages in display order.
    ///
    /// Sorting is stable, so equal `sequence_order` values keep server order.
    #[must_use]
    pub fn ordered_sub_stages(&self) -> Vec<&WorkflowSubStage> {
        let mut ordered: Vec<&WorkflowSubStage> = self.sub_stages.iter().collect();
        ordered.sort_by_key(|sub_stage| sub_stage.sequence_order);
        ordered
    }
}

/// Sort stages into display order, stable for ties
pub fn sort_stages(stages: &mut [WorkflowStage]) {
    stages.sort_by_key(|stage| stage.sequence_order);
}

fn validate_stage_hierarchy(stage: &WorkflowStage) -> Result<(), ValidationError> {
    for sub_stage in &stage.sub_stages {
        if sub_stage.stage_id != stage.id {
            return Err(ValidationError::new("stage_ownership").with_message(Cow::Owned(
                format!(
                    "sub-stage {} belongs to stage {}, not {}",
                    sub_stage.id, sub_stage.stage_id, stage.id
                ),
            )));
        }
        if sub_stage.organization_id != stage.organization_id {
            return Err(ValidationError::new("organization_mismatch").with_message(Cow::Owned(
                format!(
                    "sub-stage {} is in organization {}, stage {} is in {}",
                    sub_stage.id, sub_stage.organization_id, stage.id, stage.organization_id
                ),
            )));
        }
    }
    Ok(())
}

/// An item currently sitting in a workflow stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// Item identifier
    pub id: String,
    /// Display name of the item
    pub name: String,
    /// Order the item belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    /// Stage the item is in
    pub stage_id: String,
    /// Sub-stage the item is in, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_stage_id: Option<String>,
    /// When the item entered its current stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entered_stage_at: Option<DateTime<Utc>>,
}
