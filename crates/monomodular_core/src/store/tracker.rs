//! Change tracker for one unit of work.
//!
//! # Invariants
//! - At most one entry exists per `(table, key)`.
//! - Entries are kept in staging order; commit replays them in that order.
//! - Range staging is all-or-nothing.

use super::entity::{describe_key, AggregateRoot, EntityKey};
use super::{StoreError, StoreResult};
use log::{debug, warn};
use rusqlite::types::Value;
use std::any::Any;

/// Pending state of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Added,
    Modified,
    Deleted,
}

impl EntityState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

pub(crate) struct TrackedEntry {
    pub table: &'static str,
    pub key_column: &'static str,
    pub columns: &'static [&'static str],
    pub key: Value,
    pub values: Vec<Value>,
    pub state: EntityState,
    entity: Box<dyn Any>,
}

impl TrackedEntry {
    fn capture<T: AggregateRoot>(entity: &T, state: EntityState) -> StoreResult<Self> {
        let values = match state {
            EntityState::Added | EntityState::Modified => {
                entity.validate()?;
                entity.to_columns()?
            }
            EntityState::Deleted => Vec::new(),
        };
        if state != EntityState::Deleted && values.len() != T::COLUMNS.len() {
            return Err(StoreError::InvalidData(format!(
                "`{}` produced {} column values, expected {}",
                T::TABLE,
                values.len(),
                T::COLUMNS.len()
            )));
        }

        Ok(Self {
            table: T::TABLE,
            key_column: T::KEY_COLUMN,
            columns: T::COLUMNS,
            key: entity.key().to_sql_value(),
            values,
            state,
            entity: Box::new(entity.clone()),
        })
    }

    pub fn entity<T: AggregateRoot>(&self) -> Option<T> {
        self.entity.downcast_ref::<T>().cloned()
    }

    fn replace(&mut self, next: TrackedEntry, state: EntityState) {
        self.values = next.values;
        self.entity = next.entity;
        self.state = state;
    }
}

#[derive(Default)]
pub(crate) struct ChangeTracker {
    entries: Vec<TrackedEntry>,
}

impl ChangeTracker {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TrackedEntry] {
        &self.entries
    }

    pub fn get(&self, table: &str, key: &Value) -> Option<&TrackedEntry> {
        self.position(table, key).map(|index| &self.entries[index])
    }

    /// Drops every staged entry and returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    pub fn stage_added<T: AggregateRoot>(&mut self, entities: &[T]) -> StoreResult<()> {
        let captured = entities
            .iter()
            .map(|entity| TrackedEntry::capture(entity, EntityState::Added))
            .collect::<StoreResult<Vec<_>>>()?;

        for (index, entry) in captured.iter().enumerate() {
            let duplicate_in_batch = captured[..index]
                .iter()
                .any(|earlier| earlier.key == entry.key);
            if duplicate_in_batch || self.position(entry.table, &entry.key).is_some() {
                return Err(StoreError::AlreadyTracked {
                    table: entry.table,
                    key: describe_key(&entry.key),
                });
            }
        }

        for entry in captured {
            log_staged(&entry, EntityState::Added);
            self.entries.push(entry);
        }
        Ok(())
    }

    pub fn stage_modified<T: AggregateRoot>(&mut self, entities: &[T]) -> StoreResult<()> {
        let captured = entities
            .iter()
            .map(|entity| TrackedEntry::capture(entity, EntityState::Modified))
            .collect::<StoreResult<Vec<_>>>()?;

        for entry in captured {
            match self.position(entry.table, &entry.key) {
                Some(index) => {
                    let existing = &mut self.entries[index];
                    // Pending inserts stay inserts, with the latest values.
                    let state = match existing.state {
                        EntityState::Added => EntityState::Added,
                        EntityState::Modified | EntityState::Deleted => EntityState::Modified,
                    };
                    existing.replace(entry, state);
                    log_staged(existing, state);
                }
                None => {
                    log_staged(&entry, EntityState::Modified);
                    self.entries.push(entry);
                }
            }
        }
        Ok(())
    }

    pub fn stage_deleted<T: AggregateRoot>(&mut self, entities: &[T]) -> StoreResult<()> {
        let captured = entities
            .iter()
            .map(|entity| TrackedEntry::capture(entity, EntityState::Deleted))
            .collect::<StoreResult<Vec<_>>>()?;

        for entry in captured {
            match self.position(entry.table, &entry.key) {
                Some(index) if self.entries[index].state == EntityState::Added => {
                    let detached = self.entries.remove(index);
                    debug!(
                        "event=entity_detach module=store status=ok table={} key={}",
                        detached.table,
                        describe_key(&detached.key)
                    );
                }
                Some(index) => {
                    let existing = &mut self.entries[index];
                    existing.replace(entry, EntityState::Deleted);
                    log_staged(existing, EntityState::Deleted);
                }
                None => {
                    log_staged(&entry, EntityState::Deleted);
                    self.entries.push(entry);
                }
            }
        }
        Ok(())
    }

    fn position(&self, table: &str, key: &Value) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.table == table && entry.key == *key)
    }
}

impl Drop for ChangeTracker {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            warn!(
                "event=changes_discarded module=store status=ok reason=context_dropped count={}",
                self.entries.len()
            );
        }
    }
}

fn log_staged(entry: &TrackedEntry, state: EntityState) {
    debug!(
        "event=entity_stage module=store status=ok table={} key={} state={}",
        entry.table,
        describe_key(&entry.key),
        state.as_str()
    );
}
