mod ingest;
mod query;
mod summary;

use serde_json::Value;
use tickstore_warehouse::WarehouseConfig;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    let warehouse = warehouse_config(cli);
    match &cli.command {
        Command::Ingest(args) => ingest::run(args, warehouse).await,
        Command::Query(args) => query::run(args, warehouse),
        Command::Summary => summary::run(warehouse),
    }
}

/// `--db` wins over `--home`, which wins over `TICKSTORE_HOME`.
fn warehouse_config(cli: &Cli) -> WarehouseConfig {
    let mut config = cli
        .home
        .as_ref()
        .map_or_else(WarehouseConfig::default, WarehouseConfig::in_home);
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    config
}
