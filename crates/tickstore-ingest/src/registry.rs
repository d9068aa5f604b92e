use tickstore_core::{CompanyProfile, MarketDataProvider, Symbol, TickerIdentity};
use tickstore_warehouse::{StoreTransaction, Warehouse, WarehouseError};
use tracing::{debug, warn};

/// What [`TickerRegistry::lookup`] learned about a symbol before any
/// transaction is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickerLookup {
    Registered(TickerIdentity),
    New { symbol: Symbol, profile: CompanyProfile },
}

/// Resolves symbols to their stored ticker identity, creating it on first sight.
///
/// Resolution is split in two so the provider call happens before the
/// security's transaction opens: [`lookup`](Self::lookup) reads the store and
/// fetches metadata for unknown symbols, then [`register`](Self::register)
/// inserts inside the transaction.
pub struct TickerRegistry<'a> {
    provider: &'a dyn MarketDataProvider,
    warehouse: &'a Warehouse,
}

impl<'a> TickerRegistry<'a> {
    pub fn new(provider: &'a dyn MarketDataProvider, warehouse: &'a Warehouse) -> Self {
        Self {
            provider,
            warehouse,
        }
    }

    /// Company metadata is only fetched for new tickers. A failed metadata
    /// fetch degrades to an empty profile.
    pub async fn lookup(&self, symbol: &Symbol) -> Result<TickerLookup, WarehouseError> {
        if let Some(existing) = self.warehouse.find_ticker(symbol)? {
            debug!(%symbol, ticker_id = existing.id, "ticker already registered");
            return Ok(TickerLookup::Registered(existing));
        }

        let profile = match self.provider.company_profile(symbol).await {
            Ok(profile) => profile.unwrap_or_default(),
            Err(error) => {
                warn!(%symbol, %error, "company profile unavailable; registering without metadata");
                CompanyProfile::default()
            }
        };
        Ok(TickerLookup::New {
            symbol: symbol.clone(),
            profile,
        })
    }

    /// Returns the stored identity, inserting the ticker inside `tx` if new.
    pub fn register(
        &self,
        tx: &StoreTransaction,
        lookup: TickerLookup,
    ) -> Result<TickerIdentity, WarehouseError> {
        match lookup {
            TickerLookup::Registered(existing) => Ok(existing),
            TickerLookup::New { symbol, profile } => {
                let ticker = tx.insert_ticker(&symbol, &profile)?;
                debug!(%symbol, ticker_id = ticker.id, name = ?ticker.name, "ticker registered");
                Ok(ticker)
            }
        }
    }

    /// [`lookup`](Self::lookup) then [`register`](Self::register) in a
    /// transaction of its own.
    pub async fn resolve(&self, symbol: &Symbol) -> Result<TickerIdentity, WarehouseError> {
        let lookup = self.lookup(symbol).await?;
        let tx = self.warehouse.begin()?;
        let ticker = self.register(&tx, lookup)?;
        tx.commit()?;
        Ok(ticker)
    }
}
