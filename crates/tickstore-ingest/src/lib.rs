//! Batch ingestion for tickstore.
//!
//! | Component | Role |
//! |-----------|------|
//! | [`SymbolSource`] | ordered, de-duplicated symbol list from a file and/or arguments |
//! | [`TickerRegistry`] | find-or-create of the ticker identity row |
//! | [`BatchOrchestrator`] | fetch → normalize → persist per security, one transaction each |
//!
//! Failures are isolated per security and reported in the [`BatchReport`];
//! only a [`ConfigError`] aborts a run, and it does so before any security
//! is processed.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod symbols;

pub use config::{IngestConfig, DEFAULT_PACING};
pub use error::{ConfigError, IngestError};
pub use orchestrator::{
    BatchOrchestrator, BatchReport, SecurityOutcome, SecurityState, Stage, StopHandle,
};
pub use registry::{TickerLookup, TickerRegistry};
pub use symbols::SymbolSource;
