use ::duckdb::Connection;
use tracing::debug;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_tickers",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS seq_ticker_id START 1;

CREATE TABLE IF NOT EXISTS tickers (
    id BIGINT PRIMARY KEY DEFAULT nextval('seq_ticker_id'),
    symbol TEXT NOT NULL UNIQUE,
    name TEXT,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_security_datasets",
        sql: r#"
CREATE TABLE IF NOT EXISTS price_history (
    ticker_id BIGINT NOT NULL REFERENCES tickers(id),
    date DATE NOT NULL,
    open DOUBLE,
    high DOUBLE,
    low DOUBLE,
    close DOUBLE,
    volume BIGINT,
    PRIMARY KEY(ticker_id, date)
);

CREATE TABLE IF NOT EXISTS corporate_actions (
    ticker_id BIGINT NOT NULL REFERENCES tickers(id),
    date DATE NOT NULL,
    action_type TEXT NOT NULL,
    value DOUBLE NOT NULL CHECK (value > 0),
    PRIMARY KEY(ticker_id, date, action_type)
);

CREATE TABLE IF NOT EXISTS balance_sheet (
    ticker_id BIGINT NOT NULL REFERENCES tickers(id),
    date DATE NOT NULL,
    item_name TEXT NOT NULL,
    period TEXT NOT NULL,
    value DOUBLE,
    PRIMARY KEY(ticker_id, date, item_name, period)
);

CREATE TABLE IF NOT EXISTS cash_flow (
    ticker_id BIGINT NOT NULL REFERENCES tickers(id),
    date DATE NOT NULL,
    item_name TEXT NOT NULL,
    period TEXT NOT NULL,
    value DOUBLE,
    PRIMARY KEY(ticker_id, date, item_name, period)
);

CREATE TABLE IF NOT EXISTS income_statement (
    ticker_id BIGINT NOT NULL REFERENCES tickers(id),
    date DATE NOT NULL,
    item_name TEXT NOT NULL,
    period TEXT NOT NULL,
    value DOUBLE,
    PRIMARY KEY(ticker_id, date, item_name, period)
);

CREATE TABLE IF NOT EXISTS analyst_price_targets (
    ticker_id BIGINT NOT NULL REFERENCES tickers(id),
    date DATE NOT NULL,
    firm TEXT NOT NULL,
    target_price DOUBLE,
    rating TEXT NOT NULL,
    PRIMARY KEY(ticker_id, date, firm)
);

CREATE TABLE IF NOT EXISTS analyst_recommendations (
    ticker_id BIGINT NOT NULL REFERENCES tickers(id),
    date DATE NOT NULL,
    firm TEXT NOT NULL,
    from_grade TEXT NOT NULL,
    to_grade TEXT NOT NULL,
    action TEXT NOT NULL,
    PRIMARY KEY(ticker_id, date, firm)
);

CREATE TABLE IF NOT EXISTS sustainability (
    ticker_id BIGINT NOT NULL REFERENCES tickers(id),
    date DATE NOT NULL,
    metric_name TEXT NOT NULL,
    value DOUBLE,
    PRIMARY KEY(ticker_id, date, metric_name)
);

CREATE TABLE IF NOT EXISTS calendar_events (
    ticker_id BIGINT NOT NULL REFERENCES tickers(id),
    event_type TEXT NOT NULL,
    date DATE NOT NULL,
    description TEXT,
    PRIMARY KEY(ticker_id, event_type, date)
);
"#,
    },
    Migration {
        version: "0003_ingest_log",
        sql: r#"
CREATE TABLE IF NOT EXISTS ingest_log (
    run_id TEXT NOT NULL,
    symbol TEXT NOT NULL,
    provider TEXT NOT NULL,
    status TEXT NOT NULL,
    stage TEXT,
    reason TEXT,
    rows_written BIGINT NOT NULL DEFAULT 0,
    latency_ms BIGINT,
    logged_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0004_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_price_history_ticker_date ON price_history(ticker_id, date);
CREATE INDEX IF NOT EXISTS idx_corporate_actions_ticker_date ON corporate_actions(ticker_id, date);
CREATE INDEX IF NOT EXISTS idx_balance_sheet_ticker_date ON balance_sheet(ticker_id, date);
CREATE INDEX IF NOT EXISTS idx_cash_flow_ticker_date ON cash_flow(ticker_id, date);
CREATE INDEX IF NOT EXISTS idx_income_statement_ticker_date ON income_statement(ticker_id, date);
CREATE INDEX IF NOT EXISTS idx_analyst_price_targets_ticker_date ON analyst_price_targets(ticker_id, date);
CREATE INDEX IF NOT EXISTS idx_analyst_recommendations_ticker_date ON analyst_recommendations(ticker_id, date);
CREATE INDEX IF NOT EXISTS idx_sustainability_ticker_date ON sustainability(ticker_id, date);
CREATE INDEX IF NOT EXISTS idx_calendar_events_ticker_date ON calendar_events(ticker_id, date);
CREATE INDEX IF NOT EXISTS idx_ingest_log_run ON ingest_log(run_id, symbol);
"#,
    },
];

/// Applies every migration not yet recorded in `schema_migrations`.
///
/// Returns the versions applied by this call.
pub fn apply_migrations(connection: &Connection) -> Result<Vec<&'static str>, ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    let mut applied = Vec::new();
    for migration in MIGRATIONS {
        let already: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;
        if already > 0 {
            continue;
        }

        connection.execute_batch(migration.sql)?;
        connection.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            [migration.version],
        )?;
        debug!(version = migration.version, "applied migration");
        applied.push(migration.version);
    }

    Ok(applied)
}
