use serde_json::{json, Value};
use tickstore_warehouse::{Warehouse, WarehouseConfig};

use crate::error::CliError;

pub fn run(config: WarehouseConfig) -> Result<Value, CliError> {
    let warehouse = Warehouse::open_read_only(config)?;
    Ok(json!({
        "db_path": warehouse.db_path().display().to_string(),
        "tables": warehouse.table_counts()?,
        "tickers": warehouse.coverage()?,
    }))
}
