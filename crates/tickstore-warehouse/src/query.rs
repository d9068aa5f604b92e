//! Guarded read-only SQL over the warehouse.

use std::time::{Duration, Instant};

use ::duckdb::types::{TimeUnit, Value as DuckValue};
use ::duckdb::{Connection, Statement};
use serde::Serialize;
use serde_json::{Number, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;

use crate::WarehouseError;

const READ_KEYWORDS: &[&str] = &["SELECT", "WITH", "FROM", "EXPLAIN", "SHOW", "DESCRIBE", "SUMMARIZE"];

const WRITE_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "MERGE", "TRUNCATE", "CREATE", "DROP", "ALTER", "COPY", "ATTACH",
    "DETACH", "INSTALL", "LOAD", "PRAGMA", "SET", "RESET", "CALL", "CHECKPOINT", "VACUUM", "EXPORT",
    "IMPORT", "ANALYZE",
];

#[derive(Debug, Clone, Copy)]
pub struct QueryGuardrails {
    pub max_rows: usize,
    pub query_timeout_ms: u64,
}

impl Default for QueryGuardrails {
    fn default() -> Self {
        Self {
            max_rows: 10_000,
            query_timeout_ms: 5_000,
        }
    }
}

impl QueryGuardrails {
    fn timeout(self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub(crate) fn validate(self) -> Result<(), WarehouseError> {
        if self.max_rows == 0 {
            return Err(rejected("--max-rows must be greater than zero"));
        }
        if self.query_timeout_ms == 0 {
            return Err(rejected("--query-timeout-ms must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub r#type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<SqlColumn>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub truncated: bool,
}

/// A single statement that starts with a read-only keyword and names no
/// write keyword anywhere outside quotes.
///
/// Semicolons inside string literals or quoted identifiers do not count as
/// statement separators; trailing semicolons are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReadOnlySql<'a>(&'a str);

impl<'a> ReadOnlySql<'a> {
    pub(crate) fn parse(sql: &'a str) -> Result<Self, WarehouseError> {
        let statements = split_statements(sql);
        let statement = match statements.as_slice() {
            [] => return Err(rejected("query must not be empty")),
            [single] => *single,
            _ => return Err(rejected("multiple SQL statements are not allowed")),
        };

        let keyword = statement
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        if !READ_KEYWORDS.contains(&keyword.as_str()) {
            return Err(rejected(&format!(
                "only read-only statements are accepted ({}); got '{keyword}'",
                READ_KEYWORDS.join("/")
            )));
        }

        // Catches `EXPLAIN ANALYZE <dml>` and data-modifying CTEs.
        if let Some(word) = bare_words(statement)
            .into_iter()
            .find(|word| WRITE_KEYWORDS.contains(&word.as_str()))
        {
            return Err(rejected(&format!("'{word}' is not allowed in a read-only query")));
        }
        Ok(Self(statement))
    }

    pub(crate) fn as_str(self) -> &'a str {
        self.0
    }
}

/// Non-empty, trimmed statements separated by top-level semicolons.
fn split_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, ch) in sql.char_indices() {
        match (quote, ch) {
            (None, '\'' | '"') => quote = Some(ch),
            (Some(open), _) if ch == open => quote = None,
            (None, ';') => {
                statements.push(&sql[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    statements.push(&sql[start..]);
    statements
        .into_iter()
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .collect()
}

/// Upper-cased unquoted words of `statement`, in order.
fn bare_words(statement: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut quote: Option<char> = None;
    let mut current = String::new();
    for ch in statement.chars() {
        match quote {
            Some(open) => {
                if ch == open {
                    quote = None;
                }
            }
            None if ch.is_ascii_alphanumeric() || ch == '_' => current.push(ch.to_ascii_uppercase()),
            None => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                if matches!(ch, '\'' | '"') {
                    quote = Some(ch);
                }
            }
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn rejected(reason: &str) -> WarehouseError {
    WarehouseError::QueryRejected(reason.to_owned())
}

/// Runs `sql` once inside a transaction that is always rolled back.
pub(crate) fn execute_select_query(
    connection: &Connection,
    sql: ReadOnlySql<'_>,
    guardrails: QueryGuardrails,
) -> Result<QueryResult, WarehouseError> {
    connection.execute_batch("BEGIN TRANSACTION")?;
    let result = collect_rows(connection, sql, guardrails);
    if let Err(error) = connection.execute_batch("ROLLBACK") {
        warn!(%error, "rollback after read-only query failed");
    }
    result
}

fn collect_rows(
    connection: &Connection,
    sql: ReadOnlySql<'_>,
    guardrails: QueryGuardrails,
) -> Result<QueryResult, WarehouseError> {
    let started = Instant::now();
    let deadline = guardrails.timeout();
    let mut statement = connection.prepare(sql.as_str())?;
    let mut cursor = statement.query([])?;
    // Column metadata is only populated once the statement has run.
    let columns = cursor.as_ref().map(describe_columns).unwrap_or_default();

    let mut rows = Vec::new();
    let mut truncated = false;
    while let Some(row) = cursor.next()? {
        check_deadline(started, deadline)?;
        if rows.len() == guardrails.max_rows {
            truncated = true;
            break;
        }
        let values = (0..columns.len())
            .map(|index| row.get::<_, DuckValue>(index).map(to_json_value))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(values);
    }
    check_deadline(started, deadline)?;

    Ok(QueryResult {
        columns,
        row_count: rows.len(),
        rows,
        truncated,
    })
}

fn describe_columns(statement: &Statement<'_>) -> Vec<SqlColumn> {
    (0..statement.column_count())
        .map(|index| SqlColumn {
            name: statement
                .column_name(index)
                .map_or_else(|_| format!("column_{index}"), ToString::to_string),
            r#type: statement.column_type(index).to_string(),
        })
        .collect()
}

fn check_deadline(started: Instant, deadline: Duration) -> Result<(), WarehouseError> {
    if started.elapsed() <= deadline {
        return Ok(());
    }
    Err(WarehouseError::QueryTimeout {
        timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
    })
}

fn to_json_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(flag) => Value::Bool(flag),
        DuckValue::TinyInt(n) => Value::from(n),
        DuckValue::SmallInt(n) => Value::from(n),
        DuckValue::Int(n) => Value::from(n),
        DuckValue::BigInt(n) => Value::from(n),
        DuckValue::HugeInt(n) => {
            i64::try_from(n).map_or_else(|_| Value::String(n.to_string()), Value::from)
        }
        DuckValue::UTinyInt(n) => Value::from(n),
        DuckValue::USmallInt(n) => Value::from(n),
        DuckValue::UInt(n) => Value::from(n),
        DuckValue::UBigInt(n) => Value::from(n),
        DuckValue::Float(n) => finite_number(f64::from(n)),
        DuckValue::Double(n) => finite_number(n),
        DuckValue::Text(text) => Value::String(text),
        DuckValue::Blob(bytes) => Value::String(hex::encode(bytes)),
        DuckValue::Date32(days) => iso_date(days),
        DuckValue::Timestamp(unit, ticks) => rfc3339(unit, ticks),
        other => Value::String(format!("{other:?}")),
    }
}

fn finite_number(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// DuckDB dates arrive as days since the Unix epoch.
fn iso_date(days: i32) -> Value {
    time::macros::date!(1970 - 01 - 01)
        .to_julian_day()
        .checked_add(days)
        .and_then(|julian| time::Date::from_julian_day(julian).ok())
        .map_or_else(|| Value::from(days), |date| Value::String(date.to_string()))
}

fn rfc3339(unit: TimeUnit, ticks: i64) -> Value {
    let nanos_per_tick: i128 = match unit {
        TimeUnit::Second => 1_000_000_000,
        TimeUnit::Millisecond => 1_000_000,
        TimeUnit::Microsecond => 1_000,
        TimeUnit::Nanosecond => 1,
    };
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ticks) * nanos_per_tick)
        .ok()
        .and_then(|timestamp| timestamp.format(&Rfc3339).ok())
        .map_or_else(|| Value::from(ticks), Value::String)
}
