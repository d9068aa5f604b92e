//! Analytical views over the security tables.

use ::duckdb::Connection;

/// Creates or refreshes the analytical views:
///
/// - `vw_daily_returns`: close-to-close return per ticker and trading day
/// - `vw_ticker_coverage`: per-ticker row counts and price date range
pub fn create_views(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE OR REPLACE VIEW vw_daily_returns AS
SELECT
    t.symbol,
    p.date,
    p.close,
    CASE
        WHEN LAG(p.close) OVER w IS NULL THEN NULL
        WHEN LAG(p.close) OVER w = 0 THEN NULL
        ELSE (p.close / LAG(p.close) OVER w) - 1.0
    END AS return_pct
FROM price_history p
JOIN tickers t ON t.id = p.ticker_id
WINDOW w AS (PARTITION BY p.ticker_id ORDER BY p.date);

CREATE OR REPLACE VIEW vw_ticker_coverage AS
SELECT
    t.id AS ticker_id,
    t.symbol,
    t.name,
    (SELECT COUNT(*) FROM price_history p WHERE p.ticker_id = t.id) AS price_rows,
    (SELECT MIN(date) FROM price_history p WHERE p.ticker_id = t.id) AS first_price_date,
    (SELECT MAX(date) FROM price_history p WHERE p.ticker_id = t.id) AS last_price_date,
    (SELECT COUNT(*) FROM corporate_actions c WHERE c.ticker_id = t.id) AS corporate_action_rows,
    (SELECT COUNT(*) FROM balance_sheet b WHERE b.ticker_id = t.id)
        + (SELECT COUNT(*) FROM cash_flow c WHERE c.ticker_id = t.id)
        + (SELECT COUNT(*) FROM income_statement i WHERE i.ticker_id = t.id) AS statement_rows,
    (SELECT COUNT(*) FROM analyst_price_targets a WHERE a.ticker_id = t.id)
        + (SELECT COUNT(*) FROM analyst_recommendations r WHERE r.ticker_id = t.id) AS analyst_rows,
    (SELECT COUNT(*) FROM sustainability s WHERE s.ticker_id = t.id) AS sustainability_rows,
    (SELECT COUNT(*) FROM calendar_events e WHERE e.ticker_id = t.id) AS calendar_rows
FROM tickers t;
",
    )?;

    Ok(())
}
