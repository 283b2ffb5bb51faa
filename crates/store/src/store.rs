//! Record store boundary
//!
//! The only collaborator that owns records. Every call is a suspension
//! point; the grid awaits one batch at a time.

use labgrid_engine::error::ValidationError;
use labgrid_engine::record::{Fields, Record, RecordId};
use thiserror::Error;

/// Failure reported by the record store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The record was deleted by someone else; the list should be re-synced
    #[error("record '{0}' no longer exists")]
    NotFound(RecordId),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Network or backend failure; nothing was changed
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Worth offering a retry for
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// CRUD contract of the backing store.
///
/// Batched calls report how many records they actually touched; the
/// coordinator decides what a short count means.
#[allow(async_fn_in_trait)]
pub trait RecordStore {
    /// Current records, newest first
    async fn list(&self) -> Result<Vec<Record>, StoreError>;

    /// Patch one record
    async fn update(&self, id: &RecordId, patch: &Fields) -> Result<Record, StoreError>;

    /// Delete a batch; returns how many were deleted
    async fn delete_many(&self, ids: &[RecordId]) -> Result<usize, StoreError>;

    /// Patch a batch; returns how many were updated
    async fn update_many(&self, ids: &[RecordId], patch: &Fields) -> Result<usize, StoreError>;

    /// Insert a batch atomically; nothing is inserted if any payload fails
    async fn insert_many(&self, payloads: &[Fields]) -> Result<Vec<Record>, StoreError>;
}
