//! Environment use-case service.
//!
//! # Responsibility
//! - Provide set/get/find/list/import/remove entry points for environment
//!   records.
//! - Close each mutating use-case with one commit on the storage context.
//!
//! # Invariants
//! - Service APIs only reach storage through `EntityRepository`.
//! - Commits go to the repository's own context, the one holding the staged
//!   changes.
//! - A failed commit discards the use-case's staged changes so the context
//!   stays usable for the next call.

use crate::model::environment::{EnvironmentId, EnvironmentRecord};
use crate::repo::entity_repo::EntityRepository;
use crate::store::StoreResult;
use log::warn;
use tokio_util::sync::CancellationToken;

/// Use-case service wrapper for environment records.
pub struct EnvironmentService<R> {
    repo: R,
}

impl<R> EnvironmentService<R>
where
    R: EntityRepository<EnvironmentRecord, EnvironmentId>,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Inserts or updates the record stored under `id`.
    ///
    /// Existing metadata is preserved on update.
    pub fn set_variable(
        &self,
        id: EnvironmentId,
        key: impl Into<String>,
        value: Option<serde_json::Value>,
    ) -> StoreResult<EnvironmentRecord> {
        let key = key.into();
        let record = match self.repo.get_by_id(&id)? {
            Some(mut existing) => {
                existing.key = key;
                existing.value = value;
                self.repo.update(&existing)?;
                existing
            }
            None => {
                let mut created = EnvironmentRecord::new(id, key);
                created.value = value;
                self.repo.add(&created)?;
                created
            }
        };

        self.commit()?;
        Ok(record)
    }

    pub fn get_variable(&self, id: EnvironmentId) -> StoreResult<Option<EnvironmentRecord>> {
        self.repo.get_by_id(&id)
    }

    pub async fn get_variable_async(
        &self,
        id: EnvironmentId,
        token: &CancellationToken,
    ) -> StoreResult<Option<EnvironmentRecord>> {
        self.repo.get_by_id_async(&id, token).await
    }

    pub fn find_by_key(&self, key: &str) -> StoreResult<Option<EnvironmentRecord>> {
        self.repo
            .as_queryable()
            .where_eq("key", key.to_string())
            .first()
    }

    /// Lists all committed records ordered by id.
    pub fn list_variables(&self) -> StoreResult<Vec<EnvironmentRecord>> {
        self.repo.as_queryable().order_by("id").to_list()
    }

    /// Inserts a batch of new records in one commit.
    pub fn import_variables(&self, records: &[EnvironmentRecord]) -> StoreResult<usize> {
        self.repo.add_range(records)?;
        self.commit()
    }

    /// Removes the record stored under `id`.
    ///
    /// Returns `false` when nothing was stored under `id`.
    pub fn remove_variable(&self, id: EnvironmentId) -> StoreResult<bool> {
        self.repo.remove_by_id(&id)?;
        Ok(self.commit()? > 0)
    }

    fn commit(&self) -> StoreResult<usize> {
        let ctx = self.repo.context();
        ctx.save_changes().inspect_err(|err| {
            let dropped = ctx.discard_changes();
            warn!(
                "event=environment_commit module=service status=error dropped={} error={}",
                dropped, err
            );
        })
    }
}
