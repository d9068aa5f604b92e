use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::domain::DatasetKind;

/// Validation errors for user-supplied identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter, digit or '^': '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },
}

/// A provider table could not be mapped onto canonical records.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("{dataset}: label '{label}' is not a date")]
    UnparseableDate { dataset: DatasetKind, label: String },

    #[error("{dataset}: none of the expected columns are present ({expected})")]
    MissingColumns {
        dataset: DatasetKind,
        expected: String,
    },
}

impl NormalizationError {
    pub fn dataset(&self) -> DatasetKind {
        match self {
            Self::UnparseableDate { dataset, .. }
            | Self::MissingColumns { dataset, .. } => *dataset,
        }
    }
}

/// Provider call failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Unavailable,
    RateLimited,
    InvalidRequest,
    Malformed,
    Internal,
}

/// Structured provider/network error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
    retryable: bool,
}

impl FetchError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Malformed,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Unavailable => "fetch.unavailable",
            FetchErrorKind::RateLimited => "fetch.rate_limited",
            FetchErrorKind::InvalidRequest => "fetch.invalid_request",
            FetchErrorKind::Malformed => "fetch.malformed",
            FetchErrorKind::Internal => "fetch.internal",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FetchError {}

impl From<ValidationError> for FetchError {
    fn from(value: ValidationError) -> Self {
        Self::invalid_request(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_codes_follow_kind() {
        assert_eq!(FetchError::unavailable("down").code(), "fetch.unavailable");
        assert_eq!(FetchError::malformed("bad json").code(), "fetch.malformed");
        assert!(FetchError::rate_limited("429").retryable());
        assert!(!FetchError::invalid_request("bad symbol").retryable());
    }

    #[test]
    fn validation_error_becomes_invalid_request() {
        let error = FetchError::from(ValidationError::EmptySymbol);
        assert_eq!(error.kind(), FetchErrorKind::InvalidRequest);
        assert_eq!(error.to_string(), "symbol cannot be empty (fetch.invalid_request)");
    }
}
