//! Core contracts for tickstore.
//!
//! This crate contains:
//! - Canonical per-security records and symbol validation
//! - The provider contract plus Yahoo and fixture implementations
//! - Provider-shaped frames and the dataset normalizers that flatten them
//! - Retry, throttling and circuit-breaking for upstream calls

pub mod adapters;
pub mod circuit_breaker;
pub mod domain;
pub mod error;
pub mod frame;
pub mod http_client;
pub mod normalize;
pub mod provider;
pub mod retry;
pub mod source;
pub mod throttling;

pub use adapters::{FixtureProvider, FixtureSecurity, YahooConfig, YahooProvider};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use domain::{
    AnalystEvent, CalendarEvent, CompanyProfile, CorporateAction, CorporateActionKind,
    DatasetKind, NormalizedBatch, PeriodKind, PriceTarget, PricePoint, Recommendation,
    StatementKind, StatementLineItem, SustainabilityMetric, Symbol, TickerIdentity,
};
pub use error::{FetchError, FetchErrorKind, NormalizationError, ValidationError};
pub use frame::{Frame, FrameError, Scalar, Series};
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use normalize::DatasetNormalizer;
pub use provider::{MarketDataProvider, ProviderFuture, SecurityDatasets, StatementFrame};
pub use retry::{Backoff, RetryPolicy};
pub use source::ProviderId;
pub use throttling::RequestPacer;
