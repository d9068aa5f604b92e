//! Behavior-driven tests for dataset normalization
//!
//! These tests feed provider-shaped frames through [`DatasetNormalizer`] and
//! check the canonical records that come out, focusing on the messy inputs
//! real providers produce.

use tickstore_core::normalize::{normalize_statement, normalize_sustainability};
use tickstore_core::{
    CorporateAction, CorporateActionKind, DatasetKind, DatasetNormalizer, Frame,
    NormalizationError, PeriodKind, Scalar, SecurityDatasets, Series, StatementFrame,
    StatementKind,
};
use time::macros::{date, datetime};

fn normalizer() -> DatasetNormalizer {
    DatasetNormalizer::new(date!(2024 - 06 - 30))
}

// =============================================================================
// Normalization: Price history
// =============================================================================

#[test]
fn when_provider_sends_placeholder_values_they_become_null_not_errors() {
    // Given: A price frame mixing numbers, placeholders and non-finite values
    let mut prices = Frame::with_columns(["Open", "High", "Low", "Close", "Volume"]);
    prices
        .push_row(
            date!(2024 - 01 - 02),
            vec![
                Scalar::text("-"),
                Scalar::Float(f64::INFINITY),
                Scalar::text("366.77"),
                370.87.into(),
                Scalar::text("1,250,000"),
            ],
        )
        .expect("row");
    prices
        .push_row(
            date!(2024 - 01 - 03),
            vec![Scalar::Null, Scalar::Null, Scalar::Null, Scalar::Float(f64::NAN), Scalar::Int(-5)],
        )
        .expect("row");
    let datasets = SecurityDatasets {
        prices: Some(prices),
        ..SecurityDatasets::default()
    };

    // When: The datasets are normalized
    let batch = normalizer().normalize(&datasets).expect("normalize");

    // Then: Every price is finite or null and every volume non-negative or null
    assert_eq!(batch.prices.len(), 2);
    for point in &batch.prices {
        for value in [point.open, point.high, point.low, point.close] {
            assert!(value.map_or(true, f64::is_finite), "{point:?}");
        }
        assert!(point.volume.map_or(true, |volume| volume >= 0), "{point:?}");
    }
    assert_eq!(batch.prices[0].open, None);
    assert_eq!(batch.prices[0].low, Some(366.77));
    assert_eq!(batch.prices[0].volume, Some(1_250_000));
    assert_eq!(batch.prices[1].close, None);
    assert_eq!(batch.prices[1].volume, None);
}

#[test]
fn when_bars_carry_exchange_timestamps_the_local_trading_date_is_kept() {
    // Given: New York bars, the second one already past midnight in UTC
    let mut prices = Frame::with_columns(["Close"]);
    prices
        .push_row(datetime!(2024-01-02 00:00 -05:00), vec![370.87.into()])
        .expect("row");
    prices
        .push_row(datetime!(2024-01-03 23:30 -05:00), vec![370.6.into()])
        .expect("row");
    let datasets = SecurityDatasets {
        prices: Some(prices),
        ..SecurityDatasets::default()
    };

    // When: The datasets are normalized
    let batch = normalizer().normalize(&datasets).expect("normalize");

    // Then: Dates follow the exchange calendar, not UTC
    let dates: Vec<_> = batch.prices.iter().map(|point| point.date).collect();
    assert_eq!(dates, [date!(2024 - 01 - 02), date!(2024 - 01 - 03)]);
}

// =============================================================================
// Normalization: Corporate actions and statements
// =============================================================================

#[test]
fn when_provider_sends_split_and_dividend_series_each_keeps_its_kind() {
    // Given: One split and two dividends, one of them zero
    let mut splits = Series::default();
    splits.push(date!(2003 - 02 - 18), 2.0);
    let mut dividends = Series::default();
    dividends.push(date!(2024 - 02 - 14), 0.75);
    dividends.push(date!(2024 - 05 - 15), 0.0);
    let datasets = SecurityDatasets {
        corporate_actions: vec![
            (CorporateActionKind::Split, splits),
            (CorporateActionKind::Dividend, dividends),
        ],
        ..SecurityDatasets::default()
    };

    // When: The datasets are normalized
    let batch = normalizer().normalize(&datasets).expect("normalize");

    // Then: Zero-magnitude events are dropped and the rest are typed
    assert_eq!(
        batch.corporate_actions,
        vec![
            CorporateAction::Split {
                date: date!(2003 - 02 - 18),
                ratio: 2.0
            },
            CorporateAction::Dividend {
                date: date!(2024 - 02 - 14),
                amount: 0.75
            },
        ]
    );
}

#[test]
fn when_provider_sends_a_wide_statement_it_is_pivoted_to_line_items() {
    // Given: Two line items across two fiscal year ends, one cell missing
    let mut frame = Frame::with_columns([Scalar::text("2024-06-30"), Scalar::text("2023-06-30")]);
    frame
        .push_row("Total Revenue", vec![245_122e6.into(), 211_915e6.into()])
        .expect("row");
    frame
        .push_row("Net Income", vec![88_136e6.into(), Scalar::text("N/A")])
        .expect("row");

    // When: It is normalized as an annual income statement
    let items = normalize_statement(StatementKind::Income, PeriodKind::Annual, &frame)
        .expect("normalize");

    // Then: One long-format item per present cell, the placeholder kept as null
    assert_eq!(items.len(), 4);
    let placeholder = items
        .iter()
        .find(|item| item.item_name == "Net Income" && item.date == date!(2023 - 06 - 30))
        .expect("net income 2023");
    assert_eq!(placeholder.value, None);
    assert!(items
        .iter()
        .all(|item| item.statement == StatementKind::Income && item.period == PeriodKind::Annual));
    let revenue_2023 = items
        .iter()
        .find(|item| item.item_name == "Total Revenue" && item.date == date!(2023 - 06 - 30))
        .expect("revenue 2023");
    assert_eq!(revenue_2023.value, Some(211_915e6));
}

#[test]
fn when_statement_columns_are_not_dates_the_security_fails_normalization() {
    // Given: A statement whose columns are labels rather than report dates
    let datasets = SecurityDatasets {
        statements: vec![StatementFrame {
            kind: StatementKind::CashFlow,
            period: PeriodKind::Quarterly,
            frame: Frame::from_rows(["TTM"], vec![("Free Cash Flow".into(), [74_071e6.into()])]),
        }],
        ..SecurityDatasets::default()
    };

    // When: The datasets are normalized
    let err = normalizer().normalize(&datasets).expect_err("bad columns");

    // Then: The error names the offending dataset and label
    assert_eq!(
        err,
        NormalizationError::UnparseableDate {
            dataset: DatasetKind::Statement(StatementKind::CashFlow, PeriodKind::Quarterly),
            label: String::from("TTM"),
        }
    );
}

// =============================================================================
// Normalization: Snapshots
// =============================================================================

#[test]
fn when_sustainability_is_wide_it_is_transposed_before_emission() {
    // Given: One row, three metric columns, one of them null
    let mut wide = Frame::with_columns(["totalEsg", "environmentScore", "socialScore"]);
    wide.push_row("Value", vec![15.2.into(), 1.6.into(), Scalar::Null])
        .expect("row");

    // When: It is normalized
    let metrics = normalize_sustainability(&wide, date!(2024 - 06 - 30));

    // Then: One metric per non-null value, dated as of the snapshot
    let names: Vec<_> = metrics.iter().map(|metric| metric.metric_name.as_str()).collect();
    assert_eq!(names, ["totalEsg", "environmentScore"]);
    assert!(metrics.iter().all(|metric| metric.date == date!(2024 - 06 - 30)));
}

#[test]
fn when_sustainability_is_tall_it_is_used_as_is() {
    // Given: Three metric rows in a single value column
    let tall = Frame::from_rows(
        ["Value"],
        vec![
            ("totalEsg".into(), [15.2.into()]),
            ("governanceScore".into(), [Scalar::text("n/a")]),
            ("socialScore".into(), [7.1.into()]),
        ],
    );

    // When: It is normalized
    let metrics = normalize_sustainability(&tall, date!(2024 - 06 - 30));

    // Then: Every metric is kept in order, the placeholder coerced to null
    assert_eq!(metrics.len(), 3);
    assert_eq!(metrics[0].metric_name, "totalEsg");
    assert_eq!(metrics[1].value, None);
    assert_eq!(metrics[2].value, Some(7.1));
}

#[test]
fn when_recommendations_lack_dates_only_those_rows_are_dropped() {
    // Given: Two recommendations, the second undated
    let recommendations = Frame::from_rows(
        ["GradeDate", "Firm", "FromGrade", "ToGrade", "Action"],
        vec![
            (
                Scalar::Int(0),
                [
                    Scalar::Int(1_714_128_000),
                    "Morgan Stanley".into(),
                    "Overweight".into(),
                    "Overweight".into(),
                    "main".into(),
                ],
            ),
            (
                Scalar::Int(1),
                [Scalar::Null, "Citi".into(), "".into(), "Buy".into(), "init".into()],
            ),
        ],
    );
    let datasets = SecurityDatasets {
        recommendations: Some(recommendations),
        ..SecurityDatasets::default()
    };

    // When: The datasets are normalized
    let batch = normalizer().normalize(&datasets).expect("normalize");

    // Then: The dated row survives
    let kept: Vec<_> = batch.recommendations().collect();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].firm, "Morgan Stanley");
    assert_eq!(kept[0].date, date!(2024 - 04 - 26));
}

#[test]
fn when_no_datasets_are_present_the_batch_is_empty() {
    // Given: A security with nothing available
    let datasets = SecurityDatasets::default();

    // When: It is normalized
    let batch = normalizer().normalize(&datasets).expect("normalize");

    // Then: Nothing is produced and nothing fails
    assert!(batch.is_empty());
    assert_eq!(batch.record_count(), 0);
}
