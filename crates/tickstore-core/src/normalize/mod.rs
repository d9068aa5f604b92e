//! # Dataset normalizers
//!
//! Pure transforms from provider-shaped [`Frame`]s and [`Series`] into the
//! canonical records of [`crate::domain`]. Nothing here performs I/O.
//!
//! | Dataset | Function | Unexpected shape |
//! |---------|----------|------------------|
//! | price history | [`normalize_prices`] | error |
//! | splits / dividends / capital gains | [`normalize_actions`] | error |
//! | balance sheet / cash flow / income | [`normalize_statement`] | error |
//! | price targets | [`normalize_price_targets`] | error on undated row |
//! | recommendations | [`normalize_recommendations`] | undated rows dropped |
//! | sustainability | [`normalize_sustainability`] | non-numeric metrics dropped |
//! | calendar | [`normalize_calendar`] | non-date cells dropped |
//!
//! [`Frame`]: crate::frame::Frame
//! [`Series`]: crate::frame::Series

mod actions;
mod analyst;
pub mod coerce;
mod prices;
mod snapshot;
mod statements;

use time::Date;

use crate::domain::{AnalystEvent, DatasetKind, NormalizedBatch};
use crate::error::NormalizationError;
use crate::frame::Scalar;
use crate::provider::SecurityDatasets;

pub use actions::normalize_actions;
pub use analyst::{normalize_price_targets, normalize_recommendations};
pub use prices::normalize_prices;
pub use snapshot::{metric_rows, normalize_calendar, normalize_sustainability};
pub use statements::normalize_statement;

pub(crate) const DATE_COLUMNS: &[&str] = &["date", "datetime"];
pub(crate) const ANALYST_DATE_COLUMNS: &[&str] = &["date", "grade date", "epoch grade date"];

/// Date of a row: the date column when the frame has one, otherwise the index label.
pub(crate) fn row_date(
    dataset: DatasetKind,
    label: &Scalar,
    cells: &[Scalar],
    date_col: Option<usize>,
) -> Result<Date, NormalizationError> {
    let source = date_col.map_or(label, |col| &cells[col]);
    coerce::derive_date(source).ok_or_else(|| NormalizationError::UnparseableDate {
        dataset,
        label: describe_label(source),
    })
}

pub(crate) fn describe_label(label: &Scalar) -> String {
    coerce::coerce_text(label).unwrap_or_else(|| String::from("<null>"))
}

/// Applies every normalizer to one security's fetched datasets.
#[derive(Debug, Clone, Copy)]
pub struct DatasetNormalizer {
    as_of: Date,
}

impl DatasetNormalizer {
    /// `as_of` dates snapshot datasets that carry no date of their own.
    pub const fn new(as_of: Date) -> Self {
        Self { as_of }
    }

    pub fn normalize(&self, datasets: &SecurityDatasets) -> Result<NormalizedBatch, NormalizationError> {
        let mut batch = NormalizedBatch::default();

        if let Some(frame) = &datasets.prices {
            batch.prices = normalize_prices(frame)?;
        }
        for (kind, series) in &datasets.corporate_actions {
            batch.corporate_actions.extend(normalize_actions(*kind, series)?);
        }
        for statement in &datasets.statements {
            batch.statements.extend(normalize_statement(
                statement.kind,
                statement.period,
                &statement.frame,
            )?);
        }
        if let Some(frame) = &datasets.price_targets {
            batch.analyst_events.extend(
                normalize_price_targets(frame)?
                    .into_iter()
                    .map(AnalystEvent::PriceTarget),
            );
        }
        if let Some(frame) = &datasets.recommendations {
            batch.analyst_events.extend(
                normalize_recommendations(frame)
                    .into_iter()
                    .map(AnalystEvent::Recommendation),
            );
        }
        if let Some(frame) = &datasets.sustainability {
            batch.sustainability = normalize_sustainability(frame, self.as_of);
        }
        if let Some(frame) = &datasets.calendar {
            batch.calendar = normalize_calendar(frame);
        }

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::domain::{CorporateActionKind, PeriodKind, StatementKind};
    use crate::frame::{Frame, Series};
    use crate::provider::StatementFrame;

    #[test]
    fn normalizes_every_present_dataset() {
        let mut splits = Series::default();
        splits.push(date!(2003 - 02 - 18), 2.0);

        let datasets = SecurityDatasets {
            prices: Some(Frame::from_rows(
                ["Close", "Volume"],
                vec![(date!(2024 - 01 - 02).into(), [370.87.into(), 1000_i64.into()])],
            )),
            corporate_actions: vec![(CorporateActionKind::Split, splits)],
            statements: vec![StatementFrame {
                kind: StatementKind::Income,
                period: PeriodKind::Annual,
                frame: Frame::from_rows(
                    ["2024-06-30"],
                    vec![("Total Revenue".into(), [245_122e6.into()])],
                ),
            }],
            sustainability: Some(Frame::from_rows(
                ["Value"],
                vec![("totalEsg".into(), [15.2.into()])],
            )),
            ..SecurityDatasets::default()
        };

        let batch = DatasetNormalizer::new(date!(2024 - 09 - 01))
            .normalize(&datasets)
            .expect("normalize");
        assert_eq!(batch.prices.len(), 1);
        assert_eq!(batch.corporate_actions.len(), 1);
        assert_eq!(batch.statements.len(), 1);
        assert_eq!(batch.sustainability[0].date, date!(2024 - 09 - 01));
        assert!(batch.analyst_events.is_empty());
    }

    #[test]
    fn one_bad_dataset_fails_the_whole_batch() {
        let datasets = SecurityDatasets {
            prices: Some(Frame::from_rows(["Close"], vec![("soon".into(), [1.0.into()])])),
            ..SecurityDatasets::default()
        };
        let err = DatasetNormalizer::new(date!(2024 - 09 - 01))
            .normalize(&datasets)
            .expect_err("bad price index");
        assert_eq!(err.dataset(), DatasetKind::Prices);
    }
}
