//! Storage context: one SQLite connection plus its pending changes.
//!
//! # Responsibility
//! - Own the connection for one unit of work.
//! - Persist staged changes atomically on `save_changes`.
//! - Release the connection on `dispose`.
//!
//! # Invariants
//! - Commit replays staged entries in staging order inside one transaction.
//! - Updates and deletes must affect exactly one row, otherwise the whole
//!   commit is rolled back with `ConcurrencyConflict`.

use super::entity::{describe_key, select_sql, AggregateRoot, EntityKey};
use super::set::EntitySet;
use super::tracker::{ChangeTracker, EntityState, TrackedEntry};
use super::{StoreError, StoreResult};
use crate::db::{open_db, open_db_in_memory, DbError};
use log::{debug, error, info, warn};
use rusqlite::{params_from_iter, Connection, Transaction};
use std::cell::RefCell;
use std::path::Path;
use std::time::Instant;

/// Unit of work over one SQLite connection.
///
/// Not `Sync`: a context belongs to a single scope and is never shared.
pub struct StorageContext {
    conn: Connection,
    tracker: RefCell<ChangeTracker>,
}

impl StorageContext {
    /// Wraps an already-migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            tracker: RefCell::new(ChangeTracker::default()),
        }
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    /// Opens (and migrates) a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Returns the per-entity collection for `T`.
    pub fn set<T: AggregateRoot>(&self) -> EntitySet<'_, T> {
        EntitySet::new(self)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Number of staged entries waiting for commit.
    pub fn pending_changes(&self) -> usize {
        self.tracker.borrow().len()
    }

    /// Returns the staged state for one entity, if any.
    pub fn entity_state<T: AggregateRoot>(&self, key: &T::Key) -> Option<EntityState> {
        self.tracker
            .borrow()
            .get(T::TABLE, &key.to_sql_value())
            .map(|entry| entry.state)
    }

    /// Persists every staged change in one transaction.
    ///
    /// Returns the number of rows affected. On error nothing is written and
    /// staged changes are kept.
    pub fn save_changes(&self) -> StoreResult<usize> {
        let mut tracker = self.tracker.borrow_mut();
        if tracker.is_empty() {
            return Ok(0);
        }

        let started_at = Instant::now();
        let staged = tracker.len();
        match self.commit_entries(tracker.entries()) {
            Ok(affected) => {
                tracker.clear();
                info!(
                    "event=save_changes module=store status=ok entries={} rows={} duration_ms={}",
                    staged,
                    affected,
                    started_at.elapsed().as_millis()
                );
                Ok(affected)
            }
            Err(err) => {
                error!(
                    "event=save_changes module=store status=error entries={} duration_ms={} error={}",
                    staged,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Drops all staged changes and returns how many were dropped.
    pub fn discard_changes(&self) -> usize {
        let dropped = self.tracker.borrow_mut().clear();
        if dropped > 0 {
            info!("event=changes_discarded module=store status=ok reason=explicit count={dropped}");
        }
        dropped
    }

    /// Ends the unit of work: discards staged changes and closes the
    /// connection.
    pub fn dispose(self) -> StoreResult<()> {
        let Self { conn, tracker } = self;
        let dropped = tracker.borrow_mut().clear();
        if dropped > 0 {
            warn!("event=changes_discarded module=store status=ok reason=dispose count={dropped}");
        }

        match conn.close() {
            Ok(()) => {
                debug!("event=context_dispose module=store status=ok");
                Ok(())
            }
            Err((_conn, err)) => {
                error!("event=context_dispose module=store status=error error={err}");
                Err(StoreError::Db(DbError::Sqlite(err)))
            }
        }
    }

    pub(crate) fn find<T: AggregateRoot>(&self, key: &T::Key) -> StoreResult<Option<T>> {
        let key_value = key.to_sql_value();
        let staged = {
            let tracker = self.tracker.borrow();
            tracker
                .get(T::TABLE, &key_value)
                .map(|entry| (entry.state, entry.entity::<T>()))
        };
        match staged {
            Some((EntityState::Deleted, _)) => return Ok(None),
            Some((_, Some(entity))) => return Ok(Some(entity)),
            _ => {}
        }

        let sql = format!("{} WHERE {} = ?1", select_sql::<T>(), T::KEY_COLUMN);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt.query([key_value])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(T::from_row(row)?));
        }

        Ok(None)
    }

    pub(crate) fn tracker(&self) -> &RefCell<ChangeTracker> {
        &self.tracker
    }

    fn commit_entries(&self, entries: &[TrackedEntry]) -> StoreResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut affected = 0;
        for entry in entries {
            affected += apply_entry(&tx, entry)?;
        }
        tx.commit()?;
        Ok(affected)
    }
}

fn apply_entry(tx: &Transaction<'_>, entry: &TrackedEntry) -> StoreResult<usize> {
    match entry.state {
        EntityState::Added => {
            let mut columns = Vec::with_capacity(entry.columns.len() + 1);
            columns.push(entry.key_column);
            columns.extend_from_slice(entry.columns);
            let placeholders = (1..=columns.len())
                .map(|index| format!("?{index}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({placeholders});",
                entry.table,
                columns.join(", ")
            );
            let params = std::iter::once(&entry.key).chain(entry.values.iter());
            Ok(tx.execute(&sql, params_from_iter(params))?)
        }
        EntityState::Modified => {
            let assignments = entry
                .columns
                .iter()
                .enumerate()
                .map(|(index, column)| format!("{column} = ?{}", index + 1))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE {} SET {assignments} WHERE {} = ?{};",
                entry.table,
                entry.key_column,
                entry.columns.len() + 1
            );
            let params = entry.values.iter().chain(std::iter::once(&entry.key));
            let changed = tx.execute(&sql, params_from_iter(params))?;
            expect_single_row(entry, changed)
        }
        EntityState::Deleted => {
            let sql = format!(
                "DELETE FROM {} WHERE {} = ?1;",
                entry.table, entry.key_column
            );
            let changed = tx.execute(&sql, [&entry.key])?;
            expect_single_row(entry, changed)
        }
    }
}

fn expect_single_row(entry: &TrackedEntry, changed: usize) -> StoreResult<usize> {
    if changed == 0 {
        return Err(StoreError::ConcurrencyConflict {
            table: entry.table,
            key: describe_key(&entry.key),
        });
    }
    Ok(changed)
}
