//! SagaStore: durable persistence for saga rows.

use async_trait::async_trait;

use super::model::{SagaId, StoredSaga};

/// Errors a storage backend is allowed to surface, shared with
/// `SnapshotStore`. Anything else must be mapped into one of these
/// before crossing the trait boundary.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage connection failed: {0}")]
    ConnectionFailed(String),

    #[error("storage operation failed: {0}")]
    StorageInteractingFailed(String),

    #[error("unique constraint violation")]
    UniqueConstraintViolation,

    #[error("storage operation failed: {0}")]
    OperationFailed(String),
}

impl StorageError {
    /// Only these two are worth a retry loop; a unique-constraint violation
    /// or a generic operation failure is assumed durable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::ConnectionFailed(_) | StorageError::StorageInteractingFailed(_)
        )
    }
}

/// Durable storage for saga rows, keyed by `SagaId`.
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Inserts a new row. Fails with `UniqueConstraintViolation` if one
    /// already exists for this id.
    async fn save(&self, saga: StoredSaga) -> Result<(), StorageError>;

    /// Overwrites an existing row. Does not create one if missing.
    async fn update(&self, saga: StoredSaga) -> Result<(), StorageError>;

    async fn load(&self, id: &SagaId) -> Result<Option<StoredSaga>, StorageError>;

    /// Idempotent: removing an absent row is not an error.
    async fn remove(&self, id: &SagaId) -> Result<(), StorageError>;
}
