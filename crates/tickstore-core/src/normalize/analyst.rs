use tracing::debug;

use crate::domain::{DatasetKind, PriceTarget, Recommendation};
use crate::error::NormalizationError;
use crate::frame::{Frame, Scalar};

use super::coerce::{coerce_f64, coerce_text};
use super::{row_date, ANALYST_DATE_COLUMNS};

const FIRM: &[&str] = &["firm", "analyst", "brokerage"];
const TARGET_PRICE: &[&str] = &["target price", "price target", "target", "current"];
const RATING: &[&str] = &["rating", "to grade", "grade"];
const FROM_GRADE: &[&str] = &["from grade", "previous grade"];
const TO_GRADE: &[&str] = &["to grade", "grade"];
const ACTION: &[&str] = &["action"];

fn text_or_empty(cells: &[Scalar], col: Option<usize>) -> String {
    col.and_then(|col| coerce_text(&cells[col]))
        .unwrap_or_default()
}

/// Price-target rows. Missing firm/target/rating columns degrade to empty
/// values; a row whose date cannot be derived rejects the whole table.
pub fn normalize_price_targets(frame: &Frame) -> Result<Vec<PriceTarget>, NormalizationError> {
    if frame.is_empty() {
        return Ok(Vec::new());
    }
    let date_col = frame.column_position(ANALYST_DATE_COLUMNS);
    let firm = frame.column_position(FIRM);
    let target = frame.column_position(TARGET_PRICE);
    let rating = frame.column_position(RATING);

    frame
        .rows()
        .map(|(label, cells)| {
            Ok(PriceTarget {
                date: row_date(DatasetKind::PriceTargets, label, cells, date_col)?,
                firm: text_or_empty(cells, firm),
                target_price: target.and_then(|col| coerce_f64(&cells[col])),
                rating: text_or_empty(cells, rating),
            })
        })
        .collect()
}

/// Upgrade/downgrade rows. Rows without a derivable date are dropped.
pub fn normalize_recommendations(frame: &Frame) -> Vec<Recommendation> {
    if frame.is_empty() {
        return Vec::new();
    }
    let date_col = frame.column_position(ANALYST_DATE_COLUMNS);
    let firm = frame.column_position(FIRM);
    let from_grade = frame.column_position(FROM_GRADE);
    let to_grade = frame.column_position(TO_GRADE);
    let action = frame.column_position(ACTION);

    frame
        .rows()
        .filter_map(|(label, cells)| {
            let date = match row_date(DatasetKind::Recommendations, label, cells, date_col) {
                Ok(date) => date,
                Err(error) => {
                    debug!(%error, "dropping undated recommendation");
                    return None;
                }
            };
            Some(Recommendation {
                date,
                firm: text_or_empty(cells, firm),
                from_grade: text_or_empty(cells, from_grade),
                to_grade: text_or_empty(cells, to_grade),
                action: text_or_empty(cells, action),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn price_targets_map_named_columns() {
        let mut frame = Frame::with_columns(["Firm", "Target Price", "Rating"]);
        frame
            .push_row(
                date!(2024 - 04 - 26),
                vec!["Morgan Stanley".into(), 520.0.into(), "Overweight".into()],
            )
            .expect("row");
        frame
            .push_row(
                date!(2024 - 04 - 26),
                vec!["Jefferies".into(), Scalar::text("n/a"), Scalar::Null],
            )
            .expect("row");

        let targets = normalize_price_targets(&frame).expect("normalize");
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].target_price, Some(520.0));
        assert_eq!(targets[1].firm, "Jefferies");
        assert_eq!(targets[1].target_price, None);
        assert_eq!(targets[1].rating, "");
    }

    #[test]
    fn missing_columns_fall_back_to_empty_values() {
        let mut frame = Frame::with_columns(["Unrelated"]);
        frame.push_row(date!(2024 - 01 - 05), vec![1.0.into()]).expect("row");
        let targets = normalize_price_targets(&frame).expect("normalize");
        assert_eq!(targets[0].firm, "");
        assert_eq!(targets[0].target_price, None);
    }

    #[test]
    fn undated_price_target_is_an_error() {
        let mut frame = Frame::with_columns(["Firm"]);
        frame.push_row(Scalar::Null, vec!["Citi".into()]).expect("row");
        let err = normalize_price_targets(&frame).expect_err("undated");
        assert_eq!(err.dataset(), DatasetKind::PriceTargets);
    }

    #[test]
    fn undated_recommendations_are_dropped() {
        let mut frame = Frame::with_columns(["GradeDate", "Firm", "ToGrade", "FromGrade", "Action"]);
        frame
            .push_row(
                0_i64,
                vec![
                    "2024-04-26 10:00:00".into(),
                    "Barclays".into(),
                    "Overweight".into(),
                    "Overweight".into(),
                    "main".into(),
                ],
            )
            .expect("row");
        frame
            .push_row(
                1_i64,
                vec![Scalar::Null, "Nobody".into(), "Buy".into(), "".into(), "init".into()],
            )
            .expect("row");

        let recommendations = normalize_recommendations(&frame);
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].date, date!(2024 - 04 - 26));
        assert_eq!(recommendations[0].to_grade, "Overweight");
        assert_eq!(recommendations[0].action, "main");
    }
}
