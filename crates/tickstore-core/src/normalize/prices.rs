use crate::domain::{DatasetKind, PricePoint};
use crate::error::NormalizationError;
use crate::frame::Frame;

use super::coerce::{coerce_f64, coerce_volume};
use super::{row_date, DATE_COLUMNS};

const OPEN: &[&str] = &["open"];
const HIGH: &[&str] = &["high"];
const LOW: &[&str] = &["low"];
const CLOSE: &[&str] = &["close"];
const VOLUME: &[&str] = &["volume", "vol"];

/// One [`PricePoint`] per row of a (date × OHLCV) frame.
pub fn normalize_prices(frame: &Frame) -> Result<Vec<PricePoint>, NormalizationError> {
    if frame.is_empty() {
        return Ok(Vec::new());
    }

    let open = frame.column_position(OPEN);
    let high = frame.column_position(HIGH);
    let low = frame.column_position(LOW);
    let close = frame.column_position(CLOSE);
    let volume = frame.column_position(VOLUME);
    if [open, high, low, close, volume].iter().all(Option::is_none) {
        return Err(NormalizationError::MissingColumns {
            dataset: DatasetKind::Prices,
            expected: String::from("open, high, low, close, volume"),
        });
    }
    let date_col = frame.column_position(DATE_COLUMNS);

    let price = |cells: &[_], col: Option<usize>| col.and_then(|col| coerce_f64(&cells[col]));

    frame
        .rows()
        .map(|(label, cells)| {
            let date = row_date(DatasetKind::Prices, label, cells, date_col)?;
            Ok(PricePoint {
                date,
                open: price(cells, open),
                high: price(cells, high),
                low: price(cells, low),
                close: price(cells, close),
                volume: volume.and_then(|col| coerce_volume(&cells[col])),
            })
        })
        .collect()
}
