//! Point-in-time tables that arrive as either (metric × 1) or (1 × metric).

use time::Date;

use crate::domain::{CalendarEvent, SustainabilityMetric};
use crate::frame::{Frame, Scalar};

use super::coerce::{coerce_f64, coerce_text, derive_date};

const DESCRIPTION: &[&str] = &["description"];

/// Rotates a snapshot so that each metric is a row.
///
/// A frame with more columns than rows is taken to be metric-per-column and
/// is transposed; any other frame is already in metric-per-row form.
pub fn metric_rows(frame: &Frame) -> Frame {
    if frame.n_cols() > frame.n_rows() {
        frame.transpose()
    } else {
        frame.clone()
    }
}

/// One metric per row whose first cell is present, all dated `as_of`.
///
/// Present but non-numeric values (peer group names, performance labels)
/// are kept with a null value.
pub fn normalize_sustainability(frame: &Frame, as_of: Date) -> Vec<SustainabilityMetric> {
    let oriented = metric_rows(frame);
    oriented
        .rows()
        .filter_map(|(label, cells)| {
            let metric_name = coerce_text(label)?;
            let cell = cells.first().filter(|cell| !cell.is_missing())?;
            Some(SustainabilityMetric {
                date: as_of,
                metric_name,
                value: coerce_f64(cell),
            })
        })
        .collect()
}

/// One event per date-like cell, keyed by the row label.
///
/// An optional `description` column supplies free text for every event in
/// its row; other non-date cells are ignored.
pub fn normalize_calendar(frame: &Frame) -> Vec<CalendarEvent> {
    let oriented = metric_rows(frame);
    let description_col = oriented.column_position(DESCRIPTION);

    let mut events = Vec::new();
    for (label, cells) in oriented.rows() {
        let Some(event_type) = coerce_text(label) else {
            continue;
        };
        let description = description_col.and_then(|col| coerce_text(&cells[col]));
        for (col, cell) in cells.iter().enumerate() {
            // Integer cells here are estimates, not epoch dates.
            if Some(col) == description_col || matches!(cell, Scalar::Int(_)) {
                continue;
            }
            if let Some(date) = derive_date(cell) {
                events.push(CalendarEvent {
                    date,
                    event_type: event_type.clone(),
                    description: description.clone(),
                });
            }
        }
    }
    events
}
