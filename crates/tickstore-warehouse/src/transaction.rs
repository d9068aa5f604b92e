use ::duckdb::Connection;
use tickstore_core::{CompanyProfile, Symbol, TickerIdentity};
use tracing::warn;

use crate::pool::PooledConnection;
use crate::WarehouseError;

/// Explicit transaction over one pooled connection.
///
/// Dropping an unfinished transaction rolls it back, so an early `?` return
/// never leaves partial writes behind.
pub struct StoreTransaction {
    connection: PooledConnection,
    finished: bool,
}

impl StoreTransaction {
    pub(crate) fn begin(connection: PooledConnection) -> Result<Self, WarehouseError> {
        connection.execute_batch("BEGIN TRANSACTION")?;
        Ok(Self {
            connection,
            finished: false,
        })
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn commit(mut self) -> Result<(), WarehouseError> {
        self.finished = true;
        if let Err(error) = self.connection.execute_batch("COMMIT") {
            if let Err(rollback) = self.connection.execute_batch("ROLLBACK") {
                warn!(%rollback, "rollback after failed commit failed");
            }
            return Err(error.into());
        }
        Ok(())
    }

    pub fn rollback(mut self) -> Result<(), WarehouseError> {
        self.finished = true;
        self.connection.execute_batch("ROLLBACK")?;
        Ok(())
    }

    pub fn find_ticker(&self, symbol: &Symbol) -> Result<Option<TickerIdentity>, WarehouseError> {
        find_ticker(&self.connection, symbol)
    }

    /// Inserts the ticker unless the symbol already exists, then reads it back.
    pub fn insert_ticker(
        &self,
        symbol: &Symbol,
        profile: &CompanyProfile,
    ) -> Result<TickerIdentity, WarehouseError> {
        self.connection.execute(
            "INSERT OR IGNORE INTO tickers (symbol, name) VALUES (?, ?)",
            ::duckdb::params![symbol.as_str(), profile.name.as_deref()],
        )?;
        self.find_ticker(symbol)?.ok_or_else(|| {
            WarehouseError::InvalidData(format!("ticker '{symbol}' missing after insert"))
        })
    }
}

pub(crate) fn find_ticker(
    connection: &Connection,
    symbol: &Symbol,
) -> Result<Option<TickerIdentity>, WarehouseError> {
    let mut statement = connection.prepare("SELECT id, name, is_active FROM tickers WHERE symbol = ?")?;
    let mut rows = statement.query([symbol.as_str()])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    Ok(Some(TickerIdentity {
        id: row.get(0)?,
        symbol: symbol.clone(),
        name: row.get(1)?,
        is_active: row.get(2)?,
    }))
}

impl Drop for StoreTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(error) = self.connection.execute_batch("ROLLBACK") {
            warn!(%error, "rollback of abandoned transaction failed");
        }
    }
}
