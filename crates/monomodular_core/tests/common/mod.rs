#![allow(dead_code)]

use monomodular_core::{AggregateRoot, StorageContext, StoreError, StoreResult};
use rusqlite::types::Value;
use rusqlite::Row;
use uuid::Uuid;

/// Uuid-keyed entity living in a test-only table.
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: Uuid,
    pub name: String,
    pub weight: i64,
}

impl Widget {
    pub fn new(name: &str, weight: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            weight,
        }
    }
}

impl AggregateRoot for Widget {
    type Key = Uuid;

    const TABLE: &'static str = "widgets";
    const KEY_COLUMN: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &["name", "weight"];

    fn key(&self) -> Self::Key {
        self.id
    }

    fn to_columns(&self) -> StoreResult<Vec<Value>> {
        Ok(vec![
            Value::Text(self.name.clone()),
            Value::Integer(self.weight),
        ])
    }

    fn from_row(row: &Row<'_>) -> StoreResult<Self> {
        let id_text: String = row.get("id")?;
        let id = Uuid::parse_str(&id_text)
            .map_err(|_| StoreError::InvalidData(format!("invalid uuid `{id_text}`")))?;
        Ok(Self {
            id,
            name: row.get("name")?,
            weight: row.get("weight")?,
        })
    }
}

pub fn widget_context() -> StorageContext {
    let ctx = StorageContext::open_in_memory().unwrap();
    ctx.connection()
        .execute_batch(
            "CREATE TABLE widgets (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                weight INTEGER NOT NULL
            );",
        )
        .unwrap();
    ctx
}

pub fn stored_count(ctx: &StorageContext, table: &str) -> i64 {
    ctx.connection()
        .query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
            row.get(0)
        })
        .unwrap()
}
