//! Per-entity collection bound to a storage context.

use super::entity::AggregateRoot;
use super::query::Query;
use super::{StorageContext, StoreResult};
use std::marker::PhantomData;

/// Typed handle over the rows of `T` inside one storage context.
///
/// Mutations are staged on the context and persisted by
/// `StorageContext::save_changes`.
pub struct EntitySet<'ctx, T> {
    ctx: &'ctx StorageContext,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntitySet<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EntitySet<'_, T> {}

impl<'ctx, T: AggregateRoot> EntitySet<'ctx, T> {
    pub(crate) fn new(ctx: &'ctx StorageContext) -> Self {
        Self {
            ctx,
            _entity: PhantomData,
        }
    }

    pub fn context(&self) -> &'ctx StorageContext {
        self.ctx
    }

    /// Looks up one entity by key, preferring staged state over stored rows.
    pub fn find(&self, key: &T::Key) -> StoreResult<Option<T>> {
        self.ctx.find(key)
    }

    pub fn query(&self) -> Query<'ctx, T> {
        Query::new(self.ctx)
    }

    pub fn add(&self, entity: &T) -> StoreResult<()> {
        self.add_range(std::slice::from_ref(entity))
    }

    pub fn add_range(&self, entities: &[T]) -> StoreResult<()> {
        self.ctx.tracker().borrow_mut().stage_added(entities)
    }

    pub fn update(&self, entity: &T) -> StoreResult<()> {
        self.update_range(std::slice::from_ref(entity))
    }

    pub fn update_range(&self, entities: &[T]) -> StoreResult<()> {
        self.ctx.tracker().borrow_mut().stage_modified(entities)
    }

    pub fn remove(&self, entity: &T) -> StoreResult<()> {
        self.remove_range(std::slice::from_ref(entity))
    }

    pub fn remove_range(&self, entities: &[T]) -> StoreResult<()> {
        self.ctx.tracker().borrow_mut().stage_deleted(entities)
    }
}
