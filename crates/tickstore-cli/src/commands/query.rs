use serde_json::Value;
use tickstore_warehouse::{QueryGuardrails, Warehouse, WarehouseConfig};

use crate::cli::QueryArgs;
use crate::error::CliError;

pub fn run(args: &QueryArgs, config: WarehouseConfig) -> Result<Value, CliError> {
    let warehouse = Warehouse::open_read_only(config)?;
    let guardrails = QueryGuardrails {
        max_rows: args.max_rows,
        query_timeout_ms: args.query_timeout_ms,
    };

    let result = warehouse.execute_query(&args.query, guardrails)?;
    Ok(serde_json::to_value(&result)?)
}
