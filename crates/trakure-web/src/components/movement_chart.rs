//! Daily movement rendered as a bar table

use super::Renderer;
use serde::Serialize;
use tera::Context;
use trakure_core::{MovementStatsData, Result};

#[derive(Debug, Serialize)]
struct Row {
    date: String,
    forward: u32,
    rework: u32,
    forward_pct: u64,
    rework_pct: u64,
}

/// Share of `max`, in whole percent
fn percent(value: u32, max: u64) -> u64 {
    if max == 0 {
        0
    } else {
        u64::from(value) * 100 / max
    }
}

/// Render the series with bars scaled to the busiest day
///
/// # Errors
///
/// Returns an error if the template fails to render.
pub fn render(renderer: &Renderer, points: &[MovementStatsData]) -> Result<String> {
    let busiest = points.iter().map(MovementStatsData::total).max().unwrap_or(0);

    let rows: Vec<Row> = points
        .iter()
        .map(|point| Row {
            date: point.date.format("%Y-%m-%d").to_string(),
            forward: point.forward,
            rework: point.rework,
            forward_pct: percent(point.forward, busiest),
            rework_pct: percent(point.rework, busiest),
        })
        .collect();

    let total_forward: u64 = points.iter().map(|p| u64::from(p.forward)).sum();
    let total_rework: u64 = points.iter().map(|p| u64::from(p.rework)).sum();

    let mut context = Context::new();
    context.insert("first_date", &rows.first().map(|row| row.date.as_str()));
    context.insert("last_date", &rows.last().map(|row| row.date.as_str()));
    context.insert("total_forward", &total_forward);
    context.insert("total_rework", &total_rework);
    context.insert("rows", &rows);
    renderer.render("components/movement_chart.html", &context)
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point(day: u32, forward: u32, rework: u32) -> MovementStatsData {
        MovementStatsData {
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            forward,
            rework,
        }
    }

    #[test]
    fn test_empty_series() {
        let renderer = Renderer::new().unwrap();
        let html = render(&renderer, &[]).unwrap();

        assert!(html.contains("No movement recorded"));
        assert!(!html.contains("<table"));
    }

    #[test]
    fn test_totals_range_and_scaling() {
        let renderer = Renderer::new().unwrap();
        let html = render(&renderer, &[point(1, 6, 2), point(2, 3, 1), point(3, 0, 0)]).unwrap();

        assert!(html.contains("2024-05-01 to 2024-05-03"));
        assert!(html.contains("9 forward, 3 rework"));
        assert!(html.contains("width: 75%"));
        assert!(html.contains("width: 25%"));
        assert_eq!(html.matches("<tr>").count(), 4);
    }

    #[test]
    fn test_percent_of_zero_max() {
        assert_eq!(percent(5, 0), 0);
        assert_eq!(percent(1, 3), 33);
    }
}
