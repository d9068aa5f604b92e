//! Provider-shaped tabular data.
//!
//! Providers return labelled matrices whose orientation varies by dataset:
//! price history is (date × field), statements are (item × report date) and
//! snapshots may arrive either way round. [`Frame`] keeps the labels as
//! [`Scalar`]s so normalizers can decide what a label means.

use thiserror::Error;
use time::{Date, OffsetDateTime};

/// A single loosely-typed cell or label.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(Date),
    Timestamp(OffsetDateTime),
}

impl Scalar {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Null, or a float NaN standing in for one.
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Float(value) => value.is_nan(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Date> for Scalar {
    fn from(value: Date) -> Self {
        Self::Date(value)
    }
}

impl From<OffsetDateTime> for Scalar {
    fn from(value: OffsetDateTime) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("index has {index} labels but frame has {rows} rows")]
    IndexLength { index: usize, rows: usize },
}

/// Labelled matrix of [`Scalar`] cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    index: Vec<Scalar>,
    columns: Vec<Scalar>,
    rows: Vec<Vec<Scalar>>,
}

impl Frame {
    pub fn new(
        index: Vec<Scalar>,
        columns: Vec<Scalar>,
        rows: Vec<Vec<Scalar>>,
    ) -> Result<Self, FrameError> {
        if index.len() != rows.len() {
            return Err(FrameError::IndexLength {
                index: index.len(),
                rows: rows.len(),
            });
        }
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != columns.len() {
                return Err(FrameError::RaggedRow {
                    row,
                    expected: columns.len(),
                    found: cells.len(),
                });
            }
        }
        Ok(Self {
            index,
            columns,
            rows,
        })
    }

    /// Empty frame with the given column labels.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        Self {
            index: Vec::new(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a frame from fixed-width rows, which cannot be ragged.
    pub fn from_rows<const N: usize>(columns: [&str; N], rows: Vec<(Scalar, [Scalar; N])>) -> Self {
        let mut frame = Self::with_columns(columns);
        for (label, cells) in rows {
            frame.index.push(label);
            frame.rows.push(cells.into());
        }
        frame
    }

    pub fn push_row(
        &mut self,
        label: impl Into<Scalar>,
        cells: Vec<Scalar>,
    ) -> Result<(), FrameError> {
        if cells.len() != self.columns.len() {
            return Err(FrameError::RaggedRow {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: cells.len(),
            });
        }
        self.index.push(label.into());
        self.rows.push(cells);
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn index(&self) -> &[Scalar] {
        &self.index
    }

    pub fn columns(&self) -> &[Scalar] {
        &self.columns
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Scalar> {
        self.rows.get(row).and_then(|cells| cells.get(col))
    }

    /// Iterates `(index label, cells)` pairs in row order.
    pub fn rows(&self) -> impl Iterator<Item = (&Scalar, &[Scalar])> {
        self.index
            .iter()
            .zip(self.rows.iter().map(Vec::as_slice))
    }

    pub fn transpose(&self) -> Self {
        let rows = (0..self.columns.len())
            .map(|col| self.rows.iter().map(|cells| cells[col].clone()).collect())
            .collect();
        Self {
            index: self.columns.clone(),
            columns: self.index.clone(),
            rows,
        }
    }

    /// Position of the first column whose label matches any alias.
    ///
    /// Matching ignores ASCII case, spaces, underscores and hyphens, so
    /// `"Target Price"`, `"target_price"` and `"targetPrice"` are one column.
    pub fn column_position(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| {
            let wanted = label_key(alias);
            self.columns
                .iter()
                .position(|label| label.as_text().is_some_and(|text| label_key(text) == wanted))
        })
    }
}

/// Ordered `(label, value)` pairs, e.g. a dividend series keyed by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    entries: Vec<(Scalar, Scalar)>,
}

impl Series {
    pub fn new(entries: Vec<(Scalar, Scalar)>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, label: impl Into<Scalar>, value: impl Into<Scalar>) {
        self.entries.push((label.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Scalar, &Scalar)> {
        self.entries.iter().map(|(label, value)| (label, value))
    }
}

pub(crate) fn label_key(label: &str) -> String {
    label
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '_' | '-'))
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}
