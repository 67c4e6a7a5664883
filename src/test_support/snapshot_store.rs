//! In-memory `SnapshotStore` test double.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::saga::StorageError;
use crate::snapshot::{Snapshot, SnapshotStore};

#[derive(Default)]
pub struct MockSnapshotStore {
    rows: Mutex<HashMap<String, Snapshot>>,
}

#[async_trait]
impl SnapshotStore for MockSnapshotStore {
    async fn save(&self, snapshot: Snapshot) -> Result<(), StorageError> {
        self.rows
            .lock()
            .unwrap()
            .insert(snapshot.aggregate_id.clone(), snapshot);
        Ok(())
    }

    async fn load(&self, aggregate_id: &str) -> Result<Option<Snapshot>, StorageError> {
        Ok(self.rows.lock().unwrap().get(aggregate_id).cloned())
    }

    async fn remove(&self, aggregate_id: &str) -> Result<(), StorageError> {
        self.rows.lock().unwrap().remove(aggregate_id);
        Ok(())
    }
}
