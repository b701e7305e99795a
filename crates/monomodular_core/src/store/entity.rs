//! Entity mapping contracts between aggregate roots and SQLite rows.

use super::StoreResult;
use rusqlite::types::Value;
use rusqlite::Row;
use std::fmt::Debug;
use uuid::Uuid;

/// Primary key of an aggregate root.
///
/// Keys must map to one SQLite value; the mapping is used both for lookups
/// and for identifying staged changes.
pub trait EntityKey: Clone + Debug + PartialEq + 'static {
    fn to_sql_value(&self) -> Value;
}

impl EntityKey for i64 {
    fn to_sql_value(&self) -> Value {
        Value::Integer(*self)
    }
}

impl EntityKey for String {
    fn to_sql_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl EntityKey for Uuid {
    fn to_sql_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

/// Aggregate root persisted in one table.
///
/// `COLUMNS` lists non-key columns; `to_columns` must return values in the
/// same order.
pub trait AggregateRoot: Clone + 'static {
    type Key: EntityKey;

    const TABLE: &'static str;
    const KEY_COLUMN: &'static str;
    const COLUMNS: &'static [&'static str];

    fn key(&self) -> Self::Key;

    fn to_columns(&self) -> StoreResult<Vec<Value>>;

    fn from_row(row: &Row<'_>) -> StoreResult<Self>;

    /// Checked before an insert or update is staged.
    fn validate(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub(crate) fn select_sql<T: AggregateRoot>() -> String {
    let mut columns = Vec::with_capacity(T::COLUMNS.len() + 1);
    columns.push(T::KEY_COLUMN);
    columns.extend_from_slice(T::COLUMNS);
    format!("SELECT {} FROM {}", columns.join(", "), T::TABLE)
}

/// Resolves a caller-supplied column name to the entity's static column name.
pub(crate) fn resolve_column<T: AggregateRoot>(name: &str) -> Option<&'static str> {
    if name == T::KEY_COLUMN {
        return Some(T::KEY_COLUMN);
    }
    T::COLUMNS.iter().copied().find(|column| *column == name)
}

pub(crate) fn describe_key(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => format!("`{text}`"),
        Value::Blob(bytes) => format!("<blob {} bytes>", bytes.len()),
    }
}
