//! SnapshotStore: opaque aggregate snapshots for replay fast-forwarding.

use async_trait::async_trait;

use crate::saga::StorageError;

/// One stored snapshot: an opaque blob plus the aggregate version it was
/// taken at.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub aggregate_id: String,
    pub version: u64,
    pub payload: Vec<u8>,
}

/// Durable storage for aggregate snapshots, keyed by aggregate id. Shares
/// `StorageError` with `SagaStore`: both are opaque-blob stores behind
/// the same connection/constraint/operation failure modes.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: Snapshot) -> Result<(), StorageError>;
    async fn load(&self, aggregate_id: &str) -> Result<Option<Snapshot>, StorageError>;
    async fn remove(&self, aggregate_id: &str) -> Result<(), StorageError>;
}
