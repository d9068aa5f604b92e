//! Idempotent writes of normalized records.
//!
//! Every dataset table has a primary key over its semantic key, and every
//! insert is `INSERT OR IGNORE`: a row whose key is already stored is left
//! untouched. Duplicates inside one call are collapsed first (first
//! occurrence wins) so the outcome does not depend on statement ordering.

use std::collections::{BTreeMap, BTreeSet};

use ::duckdb::{params, Statement};
use serde::Serialize;
use tickstore_core::{
    CalendarEvent, CorporateAction, CorporateActionKind, NormalizedBatch, PeriodKind, PriceTarget,
    PricePoint, Recommendation, StatementKind, StatementLineItem, SustainabilityMetric,
    TickerIdentity,
};
use time::Date;
use tracing::debug;

use crate::transaction::StoreTransaction;
use crate::{Table, WarehouseError};

/// A canonical record with a home table and a semantic key.
pub trait StoredRecord {
    type Key: Ord;

    fn table(&self) -> Table;

    fn key(&self) -> Self::Key;

    fn insert_sql(&self) -> &'static str;

    /// Executes the prepared insert for this record; returns rows inserted.
    fn insert(&self, ticker_id: i64, statement: &mut Statement<'_>) -> Result<usize, ::duckdb::Error>;
}

/// Rows inserted per table by one persistence call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub inserted: BTreeMap<Table, usize>,
}

impl PersistReport {
    pub fn total(&self) -> usize {
        self.inserted.values().sum()
    }

    pub fn inserted_into(&self, table: Table) -> usize {
        self.inserted.get(&table).copied().unwrap_or_default()
    }

    fn add(&mut self, table: Table, rows: usize) {
        *self.inserted.entry(table).or_default() += rows;
    }
}

/// Writes records for one ticker under an open [`StoreTransaction`].
pub struct PersistenceGateway<'t> {
    tx: &'t StoreTransaction,
    ticker_id: i64,
}

impl<'t> PersistenceGateway<'t> {
    pub fn new(tx: &'t StoreTransaction, ticker: &TickerIdentity) -> Self {
        Self {
            tx,
            ticker_id: ticker.id,
        }
    }

    /// Inserts every record whose key is not yet stored.
    pub fn upsert<'r, R>(
        &self,
        records: impl IntoIterator<Item = &'r R>,
    ) -> Result<PersistReport, WarehouseError>
    where
        R: StoredRecord + 'r,
    {
        let mut seen = BTreeSet::new();
        let mut report = PersistReport::default();
        for record in records {
            if !seen.insert(record.key()) {
                debug!(table = %record.table(), "duplicate key within batch skipped");
                continue;
            }
            let mut statement = self.tx.connection().prepare_cached(record.insert_sql())?;
            let inserted = record.insert(self.ticker_id, &mut statement)?;
            report.add(record.table(), inserted);
        }
        Ok(report)
    }

    /// Persists every dataset of one normalized security.
    pub fn persist_batch(&self, batch: &NormalizedBatch) -> Result<PersistReport, WarehouseError> {
        let mut report = PersistReport::default();
        for part in [
            self.upsert(&batch.prices)?,
            self.upsert(&batch.corporate_actions)?,
            self.upsert(&batch.statements)?,
            self.upsert(batch.price_targets())?,
            self.upsert(batch.recommendations())?,
            self.upsert(&batch.sustainability)?,
            self.upsert(&batch.calendar)?,
        ] {
            for (table, rows) in part.inserted {
                report.add(table, rows);
            }
        }
        Ok(report)
    }
}

fn iso(date: Date) -> String {
    date.to_string()
}

impl StoredRecord for PricePoint {
    type Key = Date;

    fn table(&self) -> Table {
        Table::PriceHistory
    }

    fn key(&self) -> Self::Key {
        self.date
    }

    fn insert_sql(&self) -> &'static str {
        "INSERT OR IGNORE INTO price_history (ticker_id, date, open, high, low, close, volume) \
         VALUES (?, CAST(? AS DATE), ?, ?, ?, ?, ?)"
    }

    fn insert(&self, ticker_id: i64, statement: &mut Statement<'_>) -> Result<usize, ::duckdb::Error> {
        statement.execute(params![
            ticker_id,
            iso(self.date),
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        ])
    }
}

impl StoredRecord for CorporateAction {
    type Key = (Date, CorporateActionKind);

    fn table(&self) -> Table {
        Table::CorporateActions
    }

    fn key(&self) -> Self::Key {
        (self.date(), self.kind())
    }

    fn insert_sql(&self) -> &'static str {
        "INSERT OR IGNORE INTO corporate_actions (ticker_id, date, action_type, value) \
         VALUES (?, CAST(? AS DATE), ?, ?)"
    }

    fn insert(&self, ticker_id: i64, statement: &mut Statement<'_>) -> Result<usize, ::duckdb::Error> {
        statement.execute(params![
            ticker_id,
            iso(self.date()),
            self.kind().as_str(),
            self.magnitude(),
        ])
    }
}

impl StoredRecord for StatementLineItem {
    type Key = (StatementKind, Date, String, PeriodKind);

    fn table(&self) -> Table {
        Table::for_statement(self.statement)
    }

    fn key(&self) -> Self::Key {
        (self.statement, self.date, self.item_name.clone(), self.period)
    }

    fn insert_sql(&self) -> &'static str {
        match self.statement {
            StatementKind::BalanceSheet => {
                "INSERT OR IGNORE INTO balance_sheet (ticker_id, date, item_name, period, value) \
                 VALUES (?, CAST(? AS DATE), ?, ?, ?)"
            }
            StatementKind::CashFlow => {
                "INSERT OR IGNORE INTO cash_flow (ticker_id, date, item_name, period, value) \
                 VALUES (?, CAST(? AS DATE), ?, ?, ?)"
            }
            StatementKind::Income => {
                "INSERT OR IGNORE INTO income_statement (ticker_id, date, item_name, period, value) \
                 VALUES (?, CAST(? AS DATE), ?, ?, ?)"
            }
        }
    }

    fn insert(&self, ticker_id: i64, statement: &mut Statement<'_>) -> Result<usize, ::duckdb::Error> {
        statement.execute(params![
            ticker_id,
            iso(self.date),
            self.item_name,
            self.period.as_str(),
            self.value,
        ])
    }
}

impl StoredRecord for PriceTarget {
    type Key = (Date, String);

    fn table(&self) -> Table {
        Table::AnalystPriceTargets
    }

    fn key(&self) -> Self::Key {
        (self.date, self.firm.clone())
    }

    fn insert_sql(&self) -> &'static str {
        "INSERT OR IGNORE INTO analyst_price_targets (ticker_id, date, firm, target_price, rating) \
         VALUES (?, CAST(? AS DATE), ?, ?, ?)"
    }

    fn insert(&self, ticker_id: i64, statement: &mut Statement<'_>) -> Result<usize, ::duckdb::Error> {
        statement.execute(params![
            ticker_id,
            iso(self.date),
            self.firm,
            self.target_price,
            self.rating,
        ])
    }
}

impl StoredRecord for Recommendation {
    type Key = (Date, String);

    fn table(&self) -> Table {
        Table::AnalystRecommendations
    }

    fn key(&self) -> Self::Key {
        (self.date, self.firm.clone())
    }

    fn insert_sql(&self) -> &'static str {
        "INSERT OR IGNORE INTO analyst_recommendations \
         (ticker_id, date, firm, from_grade, to_grade, action) \
         VALUES (?, CAST(? AS DATE), ?, ?, ?, ?)"
    }

    fn insert(&self, ticker_id: i64, statement: &mut Statement<'_>) -> Result<usize, ::duckdb::Error> {
        statement.execute(params![
            ticker_id,
            iso(self.date),
            self.firm,
            self.from_grade,
            self.to_grade,
            self.action,
        ])
    }
}

impl StoredRecord for SustainabilityMetric {
    type Key = (Date, String);

    fn table(&self) -> Table {
        Table::Sustainability
    }

    fn key(&self) -> Self::Key {
        (self.date, self.metric_name.clone())
    }

    fn insert_sql(&self) -> &'static str {
        "INSERT OR IGNORE INTO sustainability (ticker_id, date, metric_name, value) \
         VALUES (?, CAST(? AS DATE), ?, ?)"
    }

    fn insert(&self, ticker_id: i64, statement: &mut Statement<'_>) -> Result<usize, ::duckdb::Error> {
        statement.execute(params![ticker_id, iso(self.date), self.metric_name, self.value])
    }
}

impl StoredRecord for CalendarEvent {
    type Key = (String, Date);

    fn table(&self) -> Table {
        Table::CalendarEvents
    }

    fn key(&self) -> Self::Key {
        (self.event_type.clone(), self.date)
    }

    fn insert_sql(&self) -> &'static str {
        "INSERT OR IGNORE INTO calendar_events (ticker_id, event_type, date, description) \
         VALUES (?, ?, CAST(? AS DATE), ?)"
    }

    fn insert(&self, ticker_id: i64, statement: &mut Statement<'_>) -> Result<usize, ::duckdb::Error> {
        statement.execute(params![
            ticker_id,
            self.event_type,
            iso(self.date),
            self.description,
        ])
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use tickstore_core::{AnalystEvent, CompanyProfile, Symbol};
    use time::macros::date;

    use super::*;
    use crate::{Warehouse, WarehouseConfig};

    fn price(day: Date, close: f64) -> PricePoint {
        PricePoint {
            date: day,
            open: None,
            high: None,
            low: None,
            close: Some(close),
            volume: Some(100),
        }
    }

    fn stored_close(warehouse: &Warehouse) -> f64 {
        let result = warehouse
            .execute_query("SELECT close FROM price_history", Default::default())
            .expect("query");
        result.rows[0][0].as_f64().expect("close")
    }

    #[test]
    fn duplicate_keys_within_one_call_keep_the_first_record() {
        let temp = tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig::in_home(temp.path())).expect("warehouse");
        let symbol = Symbol::parse("MSFT").expect("symbol");

        let tx = warehouse.begin().expect("begin");
        let ticker = tx.insert_ticker(&symbol, &CompanyProfile::default()).expect("ticker");
        let gateway = PersistenceGateway::new(&tx, &ticker);
        let report = gateway
            .upsert(&[price(date!(2024 - 01 - 02), 10.0), price(date!(2024 - 01 - 02), 99.0)])
            .expect("upsert");
        tx.commit().expect("commit");

        assert_eq!(report.inserted_into(Table::PriceHistory), 1);
        assert_eq!(warehouse.count_rows(Table::PriceHistory).expect("count"), 1);
        assert_eq!(stored_close(&warehouse), 10.0);
    }

    #[test]
    fn stored_rows_are_never_overwritten() {
        let temp = tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig::in_home(temp.path())).expect("warehouse");
        let symbol = Symbol::parse("MSFT").expect("symbol");

        for close in [10.0, 20.0] {
            let tx = warehouse.begin().expect("begin");
            let ticker = tx.insert_ticker(&symbol, &CompanyProfile::default()).expect("ticker");
            PersistenceGateway::new(&tx, &ticker)
                .upsert(&[price(date!(2024 - 01 - 02), close)])
                .expect("upsert");
            tx.commit().expect("commit");
        }

        assert_eq!(warehouse.count_rows(Table::PriceHistory).expect("count"), 1);
        assert_eq!(stored_close(&warehouse), 10.0);
    }

    #[test]
    fn statement_items_are_routed_by_statement_kind() {
        let temp = tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig::in_home(temp.path())).expect("warehouse");
        let symbol = Symbol::parse("MSFT").expect("symbol");
        let item = |statement, period| StatementLineItem {
            statement,
            period,
            date: date!(2024 - 06 - 30),
            item_name: String::from("Total Assets"),
            value: Some(1.0),
        };

        let batch = NormalizedBatch {
            statements: vec![
                item(StatementKind::BalanceSheet, PeriodKind::Annual),
                item(StatementKind::BalanceSheet, PeriodKind::Quarterly),
                item(StatementKind::CashFlow, PeriodKind::Annual),
            ],
            analyst_events: vec![
                AnalystEvent::PriceTarget(PriceTarget {
                    date: date!(2024 - 04 - 26),
                    firm: String::from("Citi"),
                    target_price: Some(520.0),
                    rating: String::from("Buy"),
                }),
                AnalystEvent::Recommendation(Recommendation {
                    date: date!(2024 - 04 - 26),
                    firm: String::from("Citi"),
                    from_grade: String::new(),
                    to_grade: String::from("Buy"),
                    action: String::from("init"),
                }),
            ],
            ..NormalizedBatch::default()
        };

        let tx = warehouse.begin().expect("begin");
        let ticker = tx.insert_ticker(&symbol, &CompanyProfile::default()).expect("ticker");
        let report = PersistenceGateway::new(&tx, &ticker)
            .persist_batch(&batch)
            .expect("persist");
        tx.commit().expect("commit");

        assert_eq!(report.total(), 5);
        assert_eq!(warehouse.count_rows(Table::BalanceSheet).expect("balance"), 2);
        assert_eq!(warehouse.count_rows(Table::CashFlow).expect("cash flow"), 1);
        assert_eq!(warehouse.count_rows(Table::IncomeStatement).expect("income"), 0);
        assert_eq!(warehouse.count_rows(Table::AnalystPriceTargets).expect("targets"), 1);
        assert_eq!(warehouse.count_rows(Table::AnalystRecommendations).expect("recs"), 1);
    }
}
