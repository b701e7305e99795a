//! Generic entity repository contract and its storage-context implementation.
//!
//! # Responsibility
//! - Offer CRUD, range and query operations for one aggregate root type.
//! - Forward every call to the context's per-entity collection.
//!
//! # Invariants
//! - Mutations are staged only; persistence happens on
//!   `StorageContext::save_changes`.
//! - `remove_by_id` on a missing key is a successful no-op.
//! - Async variants report `StoreError::Cancelled` when the token is
//!   cancelled before the store answers.

use crate::store::{
    run_cancellable, AggregateRoot, EntityKey, EntitySet, Query, StorageContext, StoreResult,
};
use async_trait::async_trait;
use log::debug;
use tokio_util::sync::CancellationToken;

/// Data access contract for aggregate root `T` keyed by `K`.
#[async_trait(?Send)]
pub trait EntityRepository<T, K>
where
    T: AggregateRoot<Key = K>,
    K: EntityKey,
{
    /// Unit of work that receives this repository's staged changes.
    fn context(&self) -> &StorageContext;

    /// Lazy view over all committed rows of `T`.
    fn as_queryable(&self) -> Query<'_, T>;

    fn get_by_id(&self, id: &K) -> StoreResult<Option<T>>;

    async fn get_by_id_async(&self, id: &K, token: &CancellationToken)
        -> StoreResult<Option<T>>;

    fn add(&self, entity: &T) -> StoreResult<()>;

    async fn add_async(&self, entity: &T, token: &CancellationToken) -> StoreResult<()>;

    fn add_range(&self, entities: &[T]) -> StoreResult<()>;

    async fn add_range_async(&self, entities: &[T], token: &CancellationToken)
        -> StoreResult<()>;

    fn update_range(&self, entities: &[T]) -> StoreResult<()>;

    fn remove_range(&self, entities: &[T]) -> StoreResult<()>;

    fn update(&self, entity: &T) -> StoreResult<()>;

    fn remove(&self, entity: &T) -> StoreResult<()>;

    /// Stages deletion of the entity stored under `id`, if there is one.
    fn remove_by_id(&self, id: &K) -> StoreResult<()>;
}

/// Repository backed by a borrowed `StorageContext`.
pub struct SqliteEntityRepository<'ctx, T> {
    set: EntitySet<'ctx, T>,
}

impl<'ctx, T: AggregateRoot> SqliteEntityRepository<'ctx, T> {
    pub fn new(ctx: &'ctx StorageContext) -> Self {
        Self { set: ctx.set() }
    }
}

#[async_trait(?Send)]
impl<'ctx, T: AggregateRoot> EntityRepository<T, T::Key> for SqliteEntityRepository<'ctx, T> {
    fn context(&self) -> &StorageContext {
        self.set.context()
    }

    fn as_queryable(&self) -> Query<'_, T> {
        self.set.query()
    }

    fn get_by_id(&self, id: &T::Key) -> StoreResult<Option<T>> {
        self.set.find(id)
    }

    async fn get_by_id_async(
        &self,
        id: &T::Key,
        token: &CancellationToken,
    ) -> StoreResult<Option<T>> {
        run_cancellable("repo_get_by_id", token, || self.set.find(id)).await
    }

    fn add(&self, entity: &T) -> StoreResult<()> {
        self.set.add(entity)
    }

    async fn add_async(&self, entity: &T, token: &CancellationToken) -> StoreResult<()> {
        run_cancellable("repo_add", token, || self.set.add(entity)).await
    }

    fn add_range(&self, entities: &[T]) -> StoreResult<()> {
        self.set.add_range(entities)
    }

    async fn add_range_async(
        &self,
        entities: &[T],
        token: &CancellationToken,
    ) -> StoreResult<()> {
        run_cancellable("repo_add_range", token, || self.set.add_range(entities)).await
    }

    fn update_range(&self, entities: &[T]) -> StoreResult<()> {
        self.set.update_range(entities)
    }

    fn remove_range(&self, entities: &[T]) -> StoreResult<()> {
        self.set.remove_range(entities)
    }

    fn update(&self, entity: &T) -> StoreResult<()> {
        self.set.update(entity)
    }

    fn remove(&self, entity: &T) -> StoreResult<()> {
        self.set.remove(entity)
    }

    fn remove_by_id(&self, id: &T::Key) -> StoreResult<()> {
        match self.set.find(id)? {
            Some(entity) => self.set.remove(&entity),
            None => {
                debug!(
                    "event=repo_remove_by_id module=repo status=skipped reason=not_found table={}",
                    T::TABLE
                );
                Ok(())
            }
        }
    }
}
