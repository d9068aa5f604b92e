use tracing::debug;

use crate::domain::{CorporateAction, CorporateActionKind, DatasetKind};
use crate::error::NormalizationError;
use crate::frame::Series;

use super::coerce::{coerce_f64, derive_date};
use super::describe_label;

/// One [`CorporateAction`] per dated entry of a split/dividend/capital-gain series.
///
/// Entries with a zero or non-numeric magnitude carry no event and are skipped.
pub fn normalize_actions(
    kind: CorporateActionKind,
    series: &Series,
) -> Result<Vec<CorporateAction>, NormalizationError> {
    let dataset = DatasetKind::CorporateActions(kind);
    let mut actions = Vec::with_capacity(series.len());
    for (label, value) in series.iter() {
        let date = derive_date(label).ok_or_else(|| NormalizationError::UnparseableDate {
            dataset,
            label: describe_label(label),
        })?;
        match coerce_f64(value) {
            Some(magnitude) if magnitude != 0.0 => {
                actions.push(CorporateAction::new(kind, date, magnitude));
            }
            _ => debug!(%dataset, %date, "skipping corporate action without magnitude"),
        }
    }
    Ok(actions)
}
