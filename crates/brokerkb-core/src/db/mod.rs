//! Database layer for brokerkb

mod case_repository;
mod connection;
mod migrations;
mod sync_log_repository;

use libsql::{Row, Value};

use crate::error::{Error, Result};

pub use case_repository::{CaseFilter, LibSqlCaseRepository};
pub use connection::Database;
pub use sync_log_repository::LibSqlSyncLogRepository;

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, text)
}

fn opt_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn optional_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(value) => Ok(Some(value)),
        other => Err(Error::Database(format!(
            "expected text or NULL in column {idx}, found {other:?}"
        ))),
    }
}

fn optional_int(row: &Row, idx: i32) -> Result<Option<i64>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Integer(value) => Ok(Some(value)),
        other => Err(Error::Database(format!(
            "expected integer or NULL in column {idx}, found {other:?}"
        ))),
    }
}
