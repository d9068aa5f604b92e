use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tickstore_core::{FixtureProvider, MarketDataProvider, YahooConfig, YahooProvider};
use tickstore_ingest::{BatchOrchestrator, ConfigError, IngestConfig, StopHandle, SymbolSource};
use tickstore_warehouse::{Warehouse, WarehouseConfig};
use time::macros::date;
use time::Date;
use tracing::warn;

use crate::cli::IngestArgs;
use crate::error::CliError;

/// First session of the `--mock` data set; fixed so reruns hit the same rows.
const MOCK_START: Date = date!(2024 - 01 - 02);

pub async fn run(args: &IngestArgs, warehouse: WarehouseConfig) -> Result<Value, CliError> {
    let config = IngestConfig::new(SymbolSource {
        file: args.symbols_file.clone(),
        inline: args.symbols.clone(),
    })
    .with_pacing(Duration::from_millis(args.pacing_ms));

    let symbols = config.symbols.load()?;
    let warehouse = Warehouse::open(warehouse).map_err(ConfigError::StorageUnavailable)?;
    let provider = build_provider(args.mock)?;

    let orchestrator = BatchOrchestrator::new(provider, warehouse, &config);
    let stop = orchestrator.stop_handle();
    let report =
        until_interrupted(orchestrator.run(&symbols), &stop, tokio::signal::ctrl_c).await?;

    Ok(serde_json::to_value(&report)?)
}

/// Drives `batch` to completion. The first interrupt asks for a clean stop
/// and keeps draining; a second one abandons the run.
async fn until_interrupted<T, I, S>(
    batch: impl Future<Output = T>,
    stop: &StopHandle,
    mut interrupt: I,
) -> Result<T, CliError>
where
    I: FnMut() -> S,
    S: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(batch);
    tokio::select! {
        output = &mut batch => return Ok(output),
        Ok(()) = interrupt() => {
            warn!("interrupt received; stopping after the current security (press Ctrl-C again to abort)");
            stop.request_stop();
        }
    }

    tokio::select! {
        output = &mut batch => Ok(output),
        Ok(()) = interrupt() => {
            warn!("second interrupt received; aborting without waiting for the current security");
            Err(CliError::Interrupted)
        }
    }
}

fn build_provider(mock: bool) -> Result<Arc<dyn MarketDataProvider>, CliError> {
    if mock {
        return Ok(Arc::new(FixtureProvider::synthetic(MOCK_START)));
    }
    let provider = YahooProvider::new(YahooConfig::default())
        .map_err(|error| CliError::Command(format!("failed to build Yahoo client: {error}")))?;
    Ok(Arc::new(provider))
}
