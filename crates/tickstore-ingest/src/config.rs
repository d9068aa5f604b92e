use std::time::Duration;

use crate::symbols::SymbolSource;

pub const DEFAULT_PACING: Duration = Duration::from_millis(1_000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Sleep between two securities; never applied after the last one.
    pub pacing: Duration,
    pub symbols: SymbolSource,
}

impl IngestConfig {
    pub fn new(symbols: SymbolSource) -> Self {
        Self {
            pacing: DEFAULT_PACING,
            symbols,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }
}
