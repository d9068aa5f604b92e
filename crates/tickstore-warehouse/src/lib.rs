//! DuckDB storage for tickstore.
//!
//! The schema is ticker-rooted: `tickers` holds one row per symbol and every
//! dataset table references it by `ticker_id`. Uniqueness per semantic key is
//! enforced by primary keys, and all dataset writes go through
//! [`PersistenceGateway`] inside a per-security [`StoreTransaction`].

pub mod gateway;
pub mod migrations;
pub mod pool;
pub mod query;
pub mod transaction;
pub mod views;

use std::env;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::AccessMode;
use serde::Serialize;
use thiserror::Error;
use tickstore_core::{StatementKind, Symbol, TickerIdentity};
use tracing::{debug, info};

pub use gateway::{PersistReport, PersistenceGateway, StoredRecord};
pub use pool::{ConnectionPool, PooledConnection};
pub use query::{QueryGuardrails, QueryResult, SqlColumn};
pub use transaction::StoreTransaction;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("query rejected: {0}")]
    QueryRejected(String),

    #[error("query timed out after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    #[error("connection pool lock poisoned")]
    PoolPoisoned,

    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub home: PathBuf,
    pub db_path: PathBuf,
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::in_home(resolve_tickstore_home())
    }
}

impl WarehouseConfig {
    /// Config rooted at `home`, with the database at `<home>/warehouse.duckdb`.
    pub fn in_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            db_path: home.join("warehouse.duckdb"),
            home,
            max_pool_size: 4,
        }
    }
}

/// Every table the warehouse owns, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Tickers,
    PriceHistory,
    CorporateActions,
    BalanceSheet,
    CashFlow,
    IncomeStatement,
    AnalystPriceTargets,
    AnalystRecommendations,
    Sustainability,
    CalendarEvents,
    IngestLog,
}

impl Table {
    pub const ALL: [Self; 11] = [
        Self::Tickers,
        Self::PriceHistory,
        Self::CorporateActions,
        Self::BalanceSheet,
        Self::CashFlow,
        Self::IncomeStatement,
        Self::AnalystPriceTargets,
        Self::AnalystRecommendations,
        Self::Sustainability,
        Self::CalendarEvents,
        Self::IngestLog,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tickers => "tickers",
            Self::PriceHistory => "price_history",
            Self::CorporateActions => "corporate_actions",
            Self::BalanceSheet => "balance_sheet",
            Self::CashFlow => "cash_flow",
            Self::IncomeStatement => "income_statement",
            Self::AnalystPriceTargets => "analyst_price_targets",
            Self::AnalystRecommendations => "analyst_recommendations",
            Self::Sustainability => "sustainability",
            Self::CalendarEvents => "calendar_events",
            Self::IngestLog => "ingest_log",
        }
    }

    pub const fn for_statement(kind: StatementKind) -> Self {
        match kind {
            StatementKind::BalanceSheet => Self::BalanceSheet,
            StatementKind::CashFlow => Self::CashFlow,
            StatementKind::Income => Self::IncomeStatement,
        }
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableCount {
    pub table: Table,
    pub rows: i64,
}

/// One row of `vw_ticker_coverage`.
#[derive(Debug, Clone, Serialize)]
pub struct TickerCoverage {
    pub symbol: String,
    pub name: Option<String>,
    pub price_rows: i64,
    pub first_price_date: Option<String>,
    pub last_price_date: Option<String>,
    pub corporate_action_rows: i64,
    pub statement_rows: i64,
    pub analyst_rows: i64,
    pub sustainability_rows: i64,
    pub calendar_rows: i64,
}

/// Outcome of one security in one run, as written to `ingest_log`.
#[derive(Debug, Clone)]
pub struct IngestLogEntry {
    pub run_id: String,
    pub symbol: String,
    pub provider: String,
    pub status: String,
    pub stage: Option<String>,
    pub reason: Option<String>,
    pub rows_written: u64,
    pub latency_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    pool: ConnectionPool,
}

impl Warehouse {
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, pool };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Opens an existing store that DuckDB refuses to write through.
    ///
    /// A missing database is created and migrated first, then reopened.
    pub fn open_read_only(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if !config.db_path.exists() {
            drop(Self::open(config.clone())?);
        }
        let pool = ConnectionPool::open_with_mode(
            config.db_path.clone(),
            config.max_pool_size,
            AccessMode::ReadOnly,
        )?;
        Ok(Self { config, pool })
    }

    fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire()?;
        let applied = migrations::apply_migrations(&connection)?;
        views::create_views(&connection)?;
        if !applied.is_empty() {
            info!(db = %self.db_path().display(), migrations = ?applied, "warehouse schema updated");
        }
        Ok(())
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    /// Starts the transaction one security's writes run under.
    pub fn begin(&self) -> Result<StoreTransaction, WarehouseError> {
        StoreTransaction::begin(self.pool.acquire()?)
    }

    /// Committed ticker for `symbol`, if any.
    pub fn find_ticker(&self, symbol: &Symbol) -> Result<Option<TickerIdentity>, WarehouseError> {
        transaction::find_ticker(&*self.pool.acquire()?, symbol)
    }

    /// Appends one outcome row to `ingest_log`, outside any security transaction.
    pub fn record_outcome(&self, entry: &IngestLogEntry) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire()?;
        connection.execute(
            r#"
INSERT INTO ingest_log (run_id, symbol, provider, status, stage, reason, rows_written, latency_ms)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#,
            ::duckdb::params![
                entry.run_id,
                entry.symbol,
                entry.provider,
                entry.status,
                entry.stage,
                entry.reason,
                i64::try_from(entry.rows_written).unwrap_or(i64::MAX),
                i64::try_from(entry.latency_ms).unwrap_or(i64::MAX),
            ],
        )?;
        debug!(symbol = %entry.symbol, status = %entry.status, "ingest outcome logged");
        Ok(())
    }

    pub fn count_rows(&self, table: Table) -> Result<i64, WarehouseError> {
        let connection = self.pool.acquire()?;
        let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());
        Ok(connection.query_row(sql.as_str(), [], |row| row.get(0))?)
    }

    /// Rows stored for `symbol` in `table`; zero when the ticker is unknown.
    pub fn count_rows_for(&self, table: Table, symbol: &Symbol) -> Result<i64, WarehouseError> {
        let connection = self.pool.acquire()?;
        let sql = match table {
            Table::Tickers => String::from("SELECT COUNT(*) FROM tickers WHERE symbol = ?"),
            Table::IngestLog => String::from("SELECT COUNT(*) FROM ingest_log WHERE symbol = ?"),
            other => format!(
                "SELECT COUNT(*) FROM {} d JOIN tickers t ON t.id = d.ticker_id WHERE t.symbol = ?",
                other.as_str()
            ),
        };
        Ok(connection.query_row(sql.as_str(), [symbol.as_str()], |row| row.get(0))?)
    }

    pub fn table_counts(&self) -> Result<Vec<TableCount>, WarehouseError> {
        Table::ALL
            .into_iter()
            .map(|table| {
                Ok(TableCount {
                    table,
                    rows: self.count_rows(table)?,
                })
            })
            .collect()
    }

    pub fn coverage(&self) -> Result<Vec<TickerCoverage>, WarehouseError> {
        let connection = self.pool.acquire()?;
        let mut statement = connection.prepare(
            r#"
SELECT
    symbol, name, price_rows,
    CAST(first_price_date AS VARCHAR), CAST(last_price_date AS VARCHAR),
    corporate_action_rows, statement_rows, analyst_rows, sustainability_rows, calendar_rows
FROM vw_ticker_coverage
ORDER BY symbol
"#,
        )?;
        let rows = statement.query_map([], |row| {
            Ok(TickerCoverage {
                symbol: row.get(0)?,
                name: row.get(1)?,
                price_rows: row.get(2)?,
                first_price_date: row.get(3)?,
                last_price_date: row.get(4)?,
                corporate_action_rows: row.get(5)?,
                statement_rows: row.get(6)?,
                analyst_rows: row.get(7)?,
                sustainability_rows: row.get(8)?,
                calendar_rows: row.get(9)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Runs one guarded, read-only statement.
    pub fn execute_query(
        &self,
        sql: &str,
        guardrails: QueryGuardrails,
    ) -> Result<QueryResult, WarehouseError> {
        guardrails.validate()?;
        let sql = query::ReadOnlySql::parse(sql)?;
        let connection = self.pool.acquire()?;
        query::execute_select_query(&connection, sql, guardrails)
    }
}

fn resolve_tickstore_home() -> PathBuf {
    if let Some(path) = env::var_os("TICKSTORE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".tickstore");
    }

    PathBuf::from(".tickstore")
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn open(temp: &tempfile::TempDir) -> Warehouse {
        Warehouse::open(WarehouseConfig {
            max_pool_size: 2,
            ..WarehouseConfig::in_home(temp.path().join("home"))
        })
        .expect("warehouse open")
    }

    #[test]
    fn opening_creates_every_table_and_view() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open(&temp);

        let counts = warehouse.table_counts().expect("counts");
        assert_eq!(counts.len(), Table::ALL.len());
        assert!(counts.iter().all(|count| count.rows == 0));
        assert!(warehouse.coverage().expect("coverage").is_empty());
    }

    #[test]
    fn reopening_an_existing_database_is_harmless() {
        let temp = tempdir().expect("tempdir");
        drop(open(&temp));
        let warehouse = open(&temp);
        assert_eq!(warehouse.count_rows(Table::Tickers).expect("count"), 0);
    }

    #[test]
    fn outcomes_are_appended_to_the_ingest_log() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open(&temp);
        let entry = IngestLogEntry {
            run_id: String::from("run-1"),
            symbol: String::from("AAA"),
            provider: String::from("fixture"),
            status: String::from("failed"),
            stage: Some(String::from("fetching")),
            reason: Some(String::from("boom")),
            rows_written: 0,
            latency_ms: 12,
        };

        warehouse.record_outcome(&entry).expect("first");
        warehouse.record_outcome(&entry).expect("second");

        let symbol = Symbol::parse("AAA").expect("symbol");
        assert_eq!(warehouse.count_rows_for(Table::IngestLog, &symbol).expect("count"), 2);
    }

    #[test]
    fn default_database_lives_in_the_home_directory() {
        let config = WarehouseConfig::in_home("/tmp/tickstore-home");
        assert_eq!(config.db_path, PathBuf::from("/tmp/tickstore-home/warehouse.duckdb"));
    }
}
