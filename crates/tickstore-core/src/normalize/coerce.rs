//! Total conversions from [`Scalar`] cells. None of these fail; anything that
//! cannot be represented maps to `None`.

use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::frame::Scalar;

/// Finite float value of a cell, if it has one.
pub fn coerce_f64(value: &Scalar) -> Option<f64> {
    let number = match value {
        Scalar::Null | Scalar::Date(_) | Scalar::Timestamp(_) => return None,
        Scalar::Bool(flag) => {
            if *flag {
                1.0
            } else {
                0.0
            }
        }
        Scalar::Int(number) => *number as f64,
        Scalar::Float(number) => *number,
        Scalar::Text(text) => parse_numeric_text(text.trim())?,
    };
    number.is_finite().then_some(number)
}

/// Parses a decimal number, allowing commas only as thousands separators.
fn parse_numeric_text(text: &str) -> Option<f64> {
    if !text.contains(',') {
        return text.parse().ok();
    }
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if fraction.contains(',') {
        return None;
    }
    let mut groups = whole.split(',');
    let leading_ok = groups
        .next()
        .is_some_and(|group| (1..=3).contains(&group.len()) && group.bytes().all(|b| b.is_ascii_digit()));
    let rest_ok = groups.all(|group| group.len() == 3 && group.bytes().all(|b| b.is_ascii_digit()));
    if !(leading_ok && rest_ok) {
        return None;
    }
    text.replace(',', "").parse().ok()
}

/// Non-negative share volume; fractional volumes are truncated.
pub fn coerce_volume(value: &Scalar) -> Option<i64> {
    if let Scalar::Int(number) = value {
        return (*number >= 0).then_some(*number);
    }
    let number = coerce_f64(value)?;
    if number < 0.0 || number > i64::MAX as f64 {
        return None;
    }
    Some(number.trunc() as i64)
}

/// Trimmed, non-empty text form of a cell.
pub fn coerce_text(value: &Scalar) -> Option<String> {
    let text = match value {
        Scalar::Null => return None,
        Scalar::Bool(flag) => flag.to_string(),
        Scalar::Int(number) => number.to_string(),
        Scalar::Float(number) if number.is_finite() => number.to_string(),
        Scalar::Float(_) => return None,
        Scalar::Text(text) => text.trim().to_owned(),
        Scalar::Date(date) => format_date(*date),
        Scalar::Timestamp(ts) => format_date(ts.date()),
    };
    (!text.is_empty()).then_some(text)
}

/// Calendar date of a cell.
///
/// Timestamps keep the date in their own offset, integers are Unix seconds,
/// and text must start with `YYYY-MM-DD` optionally followed by a time part
/// (`T…` or ` …`), which is the local date of an RFC3339 string.
pub fn derive_date(value: &Scalar) -> Option<Date> {
    match value {
        Scalar::Date(date) => Some(*date),
        Scalar::Timestamp(ts) => Some(ts.date()),
        Scalar::Int(seconds) => OffsetDateTime::from_unix_timestamp(*seconds)
            .ok()
            .map(OffsetDateTime::date),
        Scalar::Text(text) => parse_date_prefix(text.trim()),
        Scalar::Null | Scalar::Bool(_) | Scalar::Float(_) => None,
    }
}

fn parse_date_prefix(text: &str) -> Option<Date> {
    let head = text.get(..10)?;
    let rest = &text[10..];
    if !(rest.is_empty() || rest.starts_with('T') || rest.starts_with(' ')) {
        return None;
    }
    Date::parse(head, format_description!("[year]-[month]-[day]")).ok()
}

pub(crate) fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;

    #[test]
    fn non_numeric_values_coerce_to_none() {
        assert_eq!(coerce_f64(&Scalar::text("n/a")), None);
        assert_eq!(coerce_f64(&Scalar::Null), None);
        assert_eq!(coerce_f64(&Scalar::Float(f64::NAN)), None);
        assert_eq!(coerce_f64(&Scalar::Float(f64::INFINITY)), None);
        assert_eq!(coerce_f64(&Scalar::Date(date!(2024 - 01 - 02))), None);
    }

    #[test]
    fn numeric_text_and_ints_coerce_to_float() {
        assert_eq!(coerce_f64(&Scalar::text(" 1,234.5 ")), Some(1234.5));
        assert_eq!(coerce_f64(&Scalar::Int(7)), Some(7.0));
        assert_eq!(coerce_f64(&Scalar::Bool(true)), Some(1.0));
    }

    #[test]
    fn commas_are_only_accepted_as_thousands_separators() {
        assert_eq!(coerce_f64(&Scalar::text("1,250,000")), Some(1_250_000.0));
        assert_eq!(coerce_f64(&Scalar::text("-12,345.25")), Some(-12_345.25));
        assert_eq!(coerce_f64(&Scalar::text("1,5")), None);
        assert_eq!(coerce_f64(&Scalar::text("1,2345")), None);
        assert_eq!(coerce_f64(&Scalar::text(",100")), None);
        assert_eq!(coerce_f64(&Scalar::text("1.5,000")), None);
    }

    #[test]
    fn volume_rejects_negative_and_truncates_fractions() {
        assert_eq!(coerce_volume(&Scalar::Float(1200.9)), Some(1200));
        assert_eq!(coerce_volume(&Scalar::Int(-5)), None);
        assert_eq!(coerce_volume(&Scalar::Float(-0.5)), None);
        assert_eq!(coerce_volume(&Scalar::Float(f64::NAN)), None);
    }

    #[test]
    fn timestamps_truncate_in_their_own_offset() {
        let late_evening = datetime!(2024-01-02 23:30 -05:00);
        assert_eq!(
            derive_date(&Scalar::Timestamp(late_evening)),
            Some(date!(2024 - 01 - 02))
        );
        assert_eq!(
            derive_date(&Scalar::text("2024-01-02T23:30:00-05:00")),
            Some(date!(2024 - 01 - 02))
        );
    }

    #[test]
    fn unix_seconds_and_plain_dates_are_dates() {
        assert_eq!(derive_date(&Scalar::Int(1_704_153_600)), Some(date!(2024 - 01 - 02)));
        assert_eq!(derive_date(&Scalar::text("2023-06-30")), Some(date!(2023 - 06 - 30)));
        assert_eq!(derive_date(&Scalar::text("Total Revenue")), None);
        assert_eq!(derive_date(&Scalar::text("2023-06-30x")), None);
    }

    #[test]
    fn text_form_skips_blank_cells() {
        assert_eq!(coerce_text(&Scalar::text("  ")), None);
        assert_eq!(coerce_text(&Scalar::text(" Morgan Stanley ")), Some(String::from("Morgan Stanley")));
        assert_eq!(coerce_text(&Scalar::Date(date!(2024 - 03 - 01))), Some(String::from("2024-03-01")));
    }
}
