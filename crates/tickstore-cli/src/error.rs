use thiserror::Error;
use tickstore_ingest::ConfigError;
use tickstore_warehouse::WarehouseError;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Storage(#[from] WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("interrupted twice; run abandoned mid-security")]
    Interrupted,
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Command(_) => 2,
            Self::Storage(WarehouseError::QueryRejected(_)) => 2,
            Self::Storage(_) => 3,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
            Self::Interrupted => 130,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_queries_are_usage_errors_not_storage_failures() {
        let rejected = CliError::from(WarehouseError::QueryRejected(String::from("nope")));
        let poisoned = CliError::from(WarehouseError::PoolPoisoned);

        assert_eq!(rejected.exit_code(), 2);
        assert_eq!(poisoned.exit_code(), 3);
    }

    #[test]
    fn missing_symbols_exit_with_config_code() {
        let error = CliError::from(ConfigError::NoSymbols);
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn abandoned_runs_exit_like_a_signal() {
        assert_eq!(CliError::Interrupted.exit_code(), 130);
    }
}
