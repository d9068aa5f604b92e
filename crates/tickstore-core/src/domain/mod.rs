//! # Domain Models
//!
//! Canonical long-format records that every provider table is normalized into.
//!
//! | Type | Unique per |
//! |------|------------|
//! | [`TickerIdentity`] | symbol |
//! | [`PricePoint`] | ticker, date |
//! | [`CorporateAction`] | ticker, date, kind |
//! | [`StatementLineItem`] | ticker, date, item name, period (table per statement kind) |
//! | [`PriceTarget`] | ticker, date, firm |
//! | [`Recommendation`] | ticker, date, firm |
//! | [`SustainabilityMetric`] | ticker, date, metric name |
//! | [`CalendarEvent`] | ticker, event type, date |

mod models;
mod symbol;

pub use models::{
    AnalystEvent, CalendarEvent, CompanyProfile, CorporateAction, CorporateActionKind,
    DatasetKind, NormalizedBatch, PeriodKind, PriceTarget, PricePoint, Recommendation,
    StatementKind, StatementLineItem, SustainabilityMetric, TickerIdentity,
};
pub use symbol::Symbol;
