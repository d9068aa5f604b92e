//! CLI argument definitions for tickstore.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ingest` | Fetch and store every dataset for a list of securities |
//! | `query` | Run a read-only SQL query against the warehouse |
//! | `summary` | Show table row counts and per-ticker coverage |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--home` | `$TICKSTORE_HOME` or `~/.tickstore` | Data directory |
//! | `--db` | `<home>/warehouse.duckdb` | Warehouse database file |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! # Ingest a few securities
//! tickstore ingest MSFT AAPL --pretty
//!
//! # Ingest from a symbol file with two seconds between securities
//! tickstore ingest --symbols-file symbols.txt --pacing-ms 2000
//!
//! # Inspect what landed
//! tickstore query "SELECT * FROM vw_daily_returns WHERE symbol = 'MSFT' LIMIT 5"
//! tickstore summary --pretty
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// 🗃️ tickstore - per-security financial dataset ingestion into DuckDB
#[derive(Debug, Parser)]
#[command(
    name = "tickstore",
    author,
    version,
    about = "Financial dataset ingestion into a local DuckDB warehouse",
    long_about = "tickstore fetches price history, corporate actions, financial statements, \
analyst data, sustainability scores and calendar events for a list of securities and \
stores them in a local DuckDB warehouse.\n\
\n\
Each security is written in its own transaction: it lands completely or not at all, \
and re-running an ingest never duplicates rows.\n\
\n\
Use 'tickstore <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Data directory holding the warehouse.
    ///
    /// Falls back to TICKSTORE_HOME, then ~/.tickstore.
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Warehouse database file; overrides the one under --home.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// 📥 Ingest every dataset for one or more securities.
    ///
    /// Securities are processed one at a time. A security that fails is
    /// rolled back and reported; the run carries on with the next one.
    /// Ctrl-C finishes the current security and stops.
    ///
    /// # Examples
    ///
    ///   tickstore ingest MSFT
    ///   tickstore ingest MSFT AAPL GOOGL --pacing-ms 500
    ///   tickstore ingest --symbols-file symbols.txt
    ///   tickstore ingest AAA BBB --mock
    Ingest(IngestArgs),

    /// 🗄️ Run a read-only SQL query against the warehouse.
    ///
    /// Only SELECT, WITH, EXPLAIN, SHOW and DESCRIBE are accepted.
    ///
    /// # Examples
    ///
    ///   tickstore query "SELECT symbol, name FROM tickers"
    ///   tickstore query "SELECT * FROM price_history" --max-rows 100
    Query(QueryArgs),

    /// 📋 Show row counts per table and coverage per ticker.
    Summary,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Symbols to ingest, after any read from --symbols-file.
    pub symbols: Vec<String>,

    /// File with one symbol per line; blank lines and '#' comments are skipped.
    #[arg(long)]
    pub symbols_file: Option<PathBuf>,

    /// Pause between securities in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    pub pacing_ms: u64,

    /// Use deterministic offline data instead of Yahoo Finance.
    #[arg(long, default_value_t = false)]
    pub mock: bool,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// SQL text to execute.
    pub query: String,

    /// Maximum number of rows returned.
    #[arg(long, default_value_t = 10_000)]
    pub max_rows: usize,

    /// Query timeout in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub query_timeout_ms: u64,
}
