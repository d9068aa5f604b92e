//! Sequential, per-security batch ingestion.
//!
//! Each security moves through
//! `Pending → Fetching → Normalizing → Persisting → Committed`, or ends in
//! `Failed` from any of the three working stages. A security's writes share
//! one transaction: either every dataset lands or none does, and the ticker
//! row itself is created inside that transaction. A failed security never
//! stops the batch.

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tickstore_core::{
    DatasetNormalizer, FetchError, MarketDataProvider, ProviderId, SecurityDatasets, Symbol,
};
use tickstore_warehouse::{IngestLogEntry, PersistReport, PersistenceGateway, Warehouse};
use time::{Date, OffsetDateTime};
use tokio::sync::Notify;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::registry::TickerRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetching,
    Normalizing,
    Persisting,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::Persisting => "persisting",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SecurityState {
    Pending,
    Fetching,
    Normalizing,
    Persisting,
    Committed,
    Failed { stage: Stage, reason: String },
}

impl SecurityState {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Failed { .. })
    }

    fn advance(&mut self, symbol: &str, next: Self) {
        debug!(%symbol, from = ?self, to = ?next, "security state change");
        *self = next;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityOutcome {
    pub symbol: String,
    #[serde(flatten)]
    pub state: SecurityState,
    pub rows_written: usize,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub provider: ProviderId,
    pub committed: usize,
    pub failed: usize,
    /// Symbols never started because a stop was requested.
    pub not_started: usize,
    pub stopped_early: bool,
    pub outcomes: Vec<SecurityOutcome>,
}

impl BatchReport {
    pub fn outcome(&self, symbol: &str) -> Option<&SecurityOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.symbol.eq_ignore_ascii_case(symbol))
    }
}

/// Requests a clean stop: the in-flight security finishes, nothing new starts.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Sleeps for `pacing`, returning early if a stop is requested.
    async fn pace(&self, pacing: Duration) {
        if pacing.is_zero() || self.is_stopped() {
            return;
        }
        tokio::select! {
            () = tokio::time::sleep(pacing) => {}
            () = self.wake.notified() => {}
        }
    }
}

pub struct BatchOrchestrator {
    provider: Arc<dyn MarketDataProvider>,
    warehouse: Warehouse,
    normalizer: DatasetNormalizer,
    pacing: Duration,
    stop: StopHandle,
}

impl BatchOrchestrator {
    pub fn new(provider: Arc<dyn MarketDataProvider>, warehouse: Warehouse, config: &IngestConfig) -> Self {
        Self {
            provider,
            warehouse,
            normalizer: DatasetNormalizer::new(OffsetDateTime::now_utc().date()),
            pacing: config.pacing,
            stop: StopHandle::default(),
        }
    }

    /// Overrides the date stamped on snapshot datasets (defaults to today, UTC).
    pub fn with_as_of(mut self, as_of: Date) -> Self {
        self.normalizer = DatasetNormalizer::new(as_of);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ingests every symbol in order and reports per-security outcomes.
    pub async fn run(&self, symbols: &[String]) -> BatchReport {
        let run_id = Uuid::new_v4();
        let provider = self.provider.id();
        info!(%run_id, %provider, securities = symbols.len(), "ingest run started");

        let mut outcomes = Vec::with_capacity(symbols.len());
        for (position, raw) in symbols.iter().enumerate() {
            if self.stop.is_stopped() {
                break;
            }
            if position > 0 {
                self.stop.pace(self.pacing).await;
                if self.stop.is_stopped() {
                    break;
                }
            }

            let span = info_span!("security", symbol = %raw, %run_id);
            let outcome = self.ingest_security(raw).instrument(span.clone()).await;
            span.in_scope(|| self.log_outcome(run_id, provider, &outcome));
            outcomes.push(outcome);
        }

        let committed = outcomes
            .iter()
            .filter(|outcome| outcome.state == SecurityState::Committed)
            .count();
        let failed = outcomes.len() - committed;
        let not_started = symbols.len() - outcomes.len();
        let stopped_early = not_started > 0;
        info!(%run_id, committed, failed, not_started, stopped_early, "ingest run finished");

        BatchReport {
            run_id,
            provider,
            committed,
            failed,
            not_started,
            stopped_early,
            outcomes,
        }
    }

    async fn ingest_security(&self, raw: &str) -> SecurityOutcome {
        let started = Instant::now();
        let mut state = SecurityState::Pending;
        let result = self.process(raw, &mut state).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(report) => {
                state.advance(raw, SecurityState::Committed);
                info!(rows = report.total(), latency_ms, "security committed");
                SecurityOutcome {
                    symbol: raw.to_owned(),
                    state,
                    rows_written: report.total(),
                    latency_ms,
                }
            }
            Err(error) => {
                let stage = error.stage();
                warn!(%stage, reason = %error, "security failed; rolled back");
                state.advance(
                    raw,
                    SecurityState::Failed {
                        stage,
                        reason: error.to_string(),
                    },
                );
                SecurityOutcome {
                    symbol: raw.to_owned(),
                    state,
                    rows_written: 0,
                    latency_ms,
                }
            }
        }
    }

    async fn process(&self, raw: &str, state: &mut SecurityState) -> Result<PersistReport, IngestError> {
        state.advance(raw, SecurityState::Fetching);
        let symbol = Symbol::parse(raw).map_err(FetchError::from)?;
        let datasets = SecurityDatasets::fetch(self.provider.as_ref(), &symbol).await?;

        state.advance(raw, SecurityState::Normalizing);
        let batch = self.normalizer.normalize(&datasets)?;
        debug!(records = batch.record_count(), "datasets normalized");

        state.advance(raw, SecurityState::Persisting);
        let registry = TickerRegistry::new(self.provider.as_ref(), &self.warehouse);
        let lookup = registry.lookup(&symbol).await?;
        // Dropping `tx` on any early return rolls the whole security back.
        let tx = self.warehouse.begin()?;
        let ticker = registry.register(&tx, lookup)?;
        let report = PersistenceGateway::new(&tx, &ticker).persist_batch(&batch)?;
        tx.commit()?;
        Ok(report)
    }

    fn log_outcome(&self, run_id: Uuid, provider: ProviderId, outcome: &SecurityOutcome) {
        let (status, stage, reason) = match &outcome.state {
            SecurityState::Failed { stage, reason } => {
                ("failed", Some(stage.as_str().to_owned()), Some(reason.clone()))
            }
            _ => ("committed", None, None),
        };
        let entry = IngestLogEntry {
            run_id: run_id.to_string(),
            symbol: outcome.symbol.clone(),
            provider: provider.to_string(),
            status: status.to_owned(),
            stage,
            reason,
            rows_written: outcome.rows_written as u64,
            latency_ms: outcome.latency_ms,
        };
        if let Err(error) = self.warehouse.record_outcome(&entry) {
            warn!(%error, "failed to append ingest log entry");
        }
    }
}
