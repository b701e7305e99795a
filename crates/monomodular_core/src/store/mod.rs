//! Unit-of-work storage context over SQLite.
//!
//! # Responsibility
//! - Expose per-entity collections (`EntitySet`) bound to one connection.
//! - Stage inserts/updates/deletes and persist them on `save_changes`.
//! - Provide deferred, composable queries over committed rows.
//!
//! # Invariants
//! - Nothing staged reaches SQLite before `save_changes`.
//! - A failed commit rolls back and keeps every staged change.
//! - One context serves one unit of work; it is not shared across threads.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod cancel;
mod context;
mod entity;
mod query;
mod set;
mod tracker;

pub(crate) use cancel::run_cancellable;
pub use context::StorageContext;
pub use entity::{AggregateRoot, EntityKey};
pub use query::{Comparison, Query};
pub use set::EntitySet;
pub use tracker::EntityState;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by the storage context.
///
/// Repositories return these unchanged.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// An update or delete matched no stored row at commit time.
    ConcurrencyConflict { table: &'static str, key: String },
    /// The key is already staged in this unit of work.
    AlreadyTracked { table: &'static str, key: String },
    UnknownColumn { table: &'static str, column: String },
    InvalidData(String),
    Validation(String),
    Cancelled,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ConcurrencyConflict { table, key } => write!(
                f,
                "expected to affect one row in `{table}` for key {key} but none matched"
            ),
            Self::AlreadyTracked { table, key } => {
                write!(f, "entity `{table}` with key {key} is already tracked")
            }
            Self::UnknownColumn { table, column } => {
                write!(f, "unknown column `{column}` for `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Validation(message) => write!(f, "validation failed: {message}"),
            Self::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(value.to_string())
    }
}
