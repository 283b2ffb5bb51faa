//! Bulk Mutation Coordinator
//!
//! The grid's only path to the record store for writes. Each bulk action
//! is validated locally first, issued as ONE batched call, and judged on
//! the count the store confirms:
//!
//! - all requested -> `Applied(n)`
//! - none deleted and none of the ids left in the store -> `NoOp` (a retry
//!   of a delete that already went through)
//! - anything else -> `BulkError::Incomplete`; partial success is never
//!   reported as success
//!
//! One bulk action at a time: a second call while one is in flight fails
//! with `BulkError::Busy` without touching the store.

use std::cell::Cell;
use std::collections::HashSet;

use labgrid_engine::column::ColumnRegistry;
use labgrid_engine::error::ValidationError;
use labgrid_engine::record::{Fields, Record, RecordId};
use labgrid_engine::value::Value;
use thiserror::Error;

use crate::store::{RecordStore, StoreError};

/// What a successful bulk action did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOutcome {
    /// Store confirmed the whole batch
    Applied(usize),
    /// Nothing to do (empty batch, or already applied)
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BulkError {
    #[error("another bulk action is still running")]
    Busy,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{} has no status column", .0)]
    NoStatusColumn(String),
    #[error("{action} confirmed {confirmed} of {requested} record(s); please retry")]
    Incomplete {
        action: &'static str,
        requested: usize,
        confirmed: usize,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BulkError {
    /// Worth offering a retry for
    pub fn is_retryable(&self) -> bool {
        match self {
            BulkError::Busy | BulkError::Incomplete { .. } => true,
            BulkError::Store(e) => e.is_retryable(),
            BulkError::Validation(_) | BulkError::NoStatusColumn(_) => false,
        }
    }

    /// The record was gone; caller should re-sync its list
    pub fn is_not_found(&self) -> bool {
        matches!(self, BulkError::Store(StoreError::NotFound(_)))
    }
}

/// Clears the pending flag when the action finishes, however it finishes
struct PendingGuard<'a>(&'a Cell<bool>);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct BulkCoordinator<S> {
    store: S,
    registry: ColumnRegistry,
    pending: Cell<bool>,
}

impl<S: RecordStore> BulkCoordinator<S> {
    pub fn new(store: S, registry: ColumnRegistry) -> Self {
        Self {
            store,
            registry,
            pending: Cell::new(false),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &ColumnRegistry {
        &self.registry
    }

    /// A bulk action is in flight (disable bulk affordances)
    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    fn begin(&self) -> Result<PendingGuard<'_>, BulkError> {
        if self.pending.replace(true) {
            log::debug!("{}: bulk action refused, one is in flight", self.registry.name());
            return Err(BulkError::Busy);
        }
        Ok(PendingGuard(&self.pending))
    }

    /// Fresh record list
    pub async fn list(&self) -> Result<Vec<Record>, StoreError> {
        let records = self.store.list().await?;
        log::debug!("{}: listed {} record(s)", self.registry.name(), records.len());
        Ok(records)
    }

    /// Delete every id in one batch.
    pub async fn bulk_delete(&self, ids: &[RecordId]) -> Result<BulkOutcome, BulkError> {
        let _guard = self.begin()?;
        let ids = dedupe(ids);
        if ids.is_empty() {
            return Ok(BulkOutcome::NoOp);
        }

        let deleted = self.store.delete_many(&ids).await.map_err(|e| self.failed("delete", e))?;
        log::debug!("{}: delete confirmed {}/{}", self.registry.name(), deleted, ids.len());

        if deleted == ids.len() {
            return Ok(BulkOutcome::Applied(deleted));
        }
        if deleted == 0 && !self.any_remaining(&ids).await? {
            log::debug!("{}: delete already applied", self.registry.name());
            return Ok(BulkOutcome::NoOp);
        }
        Err(self.incomplete("delete", ids.len(), deleted))
    }

    /// Set the status column of every id, after checking `status` is one
    /// of the sheet's allowed values. An invalid status never reaches the
    /// store.
    pub async fn bulk_update_status(
        &self,
        ids: &[RecordId],
        status: &str,
    ) -> Result<BulkOutcome, BulkError> {
        let _guard = self.begin()?;

        let column = self
            .registry
            .status_column()
            .ok_or_else(|| BulkError::NoStatusColumn(self.registry.name().to_string()))?;
        if status.trim().is_empty() {
            return Err(ValidationError::new(&column.id, "a status is required").into());
        }
        let value = column.validate(&Value::from(status))?;

        let ids = dedupe(ids);
        if ids.is_empty() {
            return Ok(BulkOutcome::NoOp);
        }

        let mut patch = Fields::new();
        patch.insert(column.id.clone(), value);
        let updated = self
            .store
            .update_many(&ids, &patch)
            .await
            .map_err(|e| self.failed("status update", e))?;
        log::debug!("{}: status update confirmed {}/{}", self.registry.name(), updated, ids.len());

        if updated == ids.len() {
            Ok(BulkOutcome::Applied(updated))
        } else {
            Err(self.incomplete("status update", ids.len(), updated))
        }
    }

    /// Insert every payload in one batch. Any invalid payload rejects the
    /// whole batch before the store is called.
    pub async fn bulk_insert(&self, payloads: &[Fields]) -> Result<BulkOutcome, BulkError> {
        let _guard = self.begin()?;
        if payloads.is_empty() {
            return Ok(BulkOutcome::NoOp);
        }

        let mut validated = Vec::with_capacity(payloads.len());
        for (i, payload) in payloads.iter().enumerate() {
            validated.push(self.registry.validate_payload(payload).map_err(|e| e.at_row(i + 1))?);
        }

        let inserted = self
            .store
            .insert_many(&validated)
            .await
            .map_err(|e| self.failed("insert", e))?;
        log::debug!("{}: insert confirmed {}/{}", self.registry.name(), inserted.len(), validated.len());

        if inserted.len() == validated.len() {
            Ok(BulkOutcome::Applied(inserted.len()))
        } else {
            Err(self.incomplete("insert", validated.len(), inserted.len()))
        }
    }

    /// Single cell edit, validated against the column first
    pub async fn update_record(
        &self,
        id: &RecordId,
        column_id: &str,
        value: Value,
    ) -> Result<Record, BulkError> {
        let mut patch = Fields::new();
        patch.insert(column_id.to_string(), value);
        let patch = self.registry.validate_patch(&patch)?;

        let record = self.store.update(id, &patch).await.map_err(|e| {
            match &e {
                StoreError::NotFound(_) => log::debug!("{}: edit target {} is gone", self.registry.name(), id),
                _ => log::warn!("{}: edit of {} failed: {}", self.registry.name(), id, e),
            }
            BulkError::Store(e)
        })?;
        Ok(record)
    }

    async fn any_remaining(&self, ids: &[RecordId]) -> Result<bool, BulkError> {
        let wanted: HashSet<&RecordId> = ids.iter().collect();
        let records = self.store.list().await.map_err(|e| self.failed("delete check", e))?;
        Ok(records.iter().any(|r| wanted.contains(&r.id)))
    }

    fn failed(&self, action: &str, err: StoreError) -> BulkError {
        log::warn!("{}: {} failed: {}", self.registry.name(), action, err);
        BulkError::Store(err)
    }

    fn incomplete(&self, action: &'static str, requested: usize, confirmed: usize) -> BulkError {
        let err = BulkError::Incomplete {
            action,
            requested,
            confirmed,
        };
        log::warn!("{}: {}", self.registry.name(), err);
        err
    }
}

/// Drop repeated ids, keeping first occurrence order
fn dedupe(ids: &[RecordId]) -> Vec<RecordId> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert(*id)).cloned().collect()
}
