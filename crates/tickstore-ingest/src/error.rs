use std::path::PathBuf;

use thiserror::Error;
use tickstore_core::{FetchError, NormalizationError};
use tickstore_warehouse::WarehouseError;

use crate::orchestrator::Stage;

/// Why one security did not complete.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error(transparent)]
    Persistence(#[from] WarehouseError),
}

impl IngestError {
    /// Pipeline stage the error was raised in.
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Fetch(_) => Stage::Fetching,
            Self::Normalization(_) => Stage::Normalizing,
            Self::Persistence(_) => Stage::Persisting,
        }
    }
}

/// Startup problems; any of these aborts the run before a security is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("symbol file '{}' does not exist", path.display())]
    SymbolSourceMissing { path: PathBuf },

    #[error("failed to read symbol file '{}': {source}", path.display())]
    SymbolSourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no symbols given; pass symbols inline or via --symbols-file")]
    NoSymbols,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] WarehouseError),
}
