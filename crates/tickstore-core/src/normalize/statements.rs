use crate::domain::{DatasetKind, PeriodKind, StatementKind, StatementLineItem};
use crate::error::NormalizationError;
use crate::frame::Frame;

use super::coerce::{coerce_f64, coerce_text, derive_date};
use super::describe_label;

/// Unpivots an (item × report date) statement matrix into line items.
///
/// Every column label must be a date. Null and NaN cells are skipped rather
/// than stored, as are rows without an item name; a present cell that is not
/// numeric is kept with a null value.
pub fn normalize_statement(
    statement: StatementKind,
    period: PeriodKind,
    frame: &Frame,
) -> Result<Vec<StatementLineItem>, NormalizationError> {
    let dataset = DatasetKind::Statement(statement, period);
    let dates = frame
        .columns()
        .iter()
        .map(|label| {
            derive_date(label).ok_or_else(|| NormalizationError::UnparseableDate {
                dataset,
                label: describe_label(label),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut items = Vec::new();
    for (label, cells) in frame.rows() {
        let Some(item_name) = coerce_text(label) else {
            continue;
        };
        for (date, cell) in dates.iter().zip(cells) {
            if cell.is_missing() {
                continue;
            }
            items.push(StatementLineItem {
                statement,
                period,
                date: *date,
                item_name: item_name.clone(),
                value: coerce_f64(cell),
            });
        }
    }
    Ok(items)
}
