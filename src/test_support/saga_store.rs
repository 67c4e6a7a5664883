//! In-memory `SagaStore` test double.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::saga::{SagaId, SagaStore, StorageError, StoredSaga};

#[derive(Default)]
pub struct MockSagaStore {
    rows: Mutex<HashMap<SagaId, StoredSaga>>,
    pending_failures: Mutex<VecDeque<StorageErrorKind>>,
}

#[derive(Debug, Clone, Copy)]
enum StorageErrorKind {
    Connection,
    Interacting,
}

impl MockSagaStore {
    /// Queues one transient failure for the next `save`/`update`/`load`
    /// call; call it `n` times to make the `n`-th-next call the first to
    /// succeed, for exercising `SagaProvider`'s retry loop.
    pub fn fail_next_with_connection_error(&self) {
        self.pending_failures
            .lock()
            .unwrap()
            .push_back(StorageErrorKind::Connection);
    }

    pub fn fail_next_with_interacting_error(&self) {
        self.pending_failures
            .lock()
            .unwrap()
            .push_back(StorageErrorKind::Interacting);
    }

    fn take_failure(&self) -> Option<StorageError> {
        match self.pending_failures.lock().unwrap().pop_front()? {
            StorageErrorKind::Connection => Some(StorageError::ConnectionFailed("mock".into())),
            StorageErrorKind::Interacting => {
                Some(StorageError::StorageInteractingFailed("mock".into()))
            }
        }
    }

    pub fn rows_snapshot(&self) -> HashMap<SagaId, StoredSaga> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl SagaStore for MockSagaStore {
    async fn save(&self, saga: StoredSaga) -> Result<(), StorageError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&saga.id) {
            return Err(StorageError::UniqueConstraintViolation);
        }
        rows.insert(saga.id.clone(), saga);
        Ok(())
    }

    async fn update(&self, saga: StoredSaga) -> Result<(), StorageError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let mut rows = self.rows.lock().unwrap();
        if !rows.contains_key(&saga.id) {
            return Err(StorageError::OperationFailed(
                "no such saga to update".into(),
            ));
        }
        rows.insert(saga.id.clone(), saga);
        Ok(())
    }

    async fn load(&self, id: &SagaId) -> Result<Option<StoredSaga>, StorageError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    async fn remove(&self, id: &SagaId) -> Result<(), StorageError> {
        self.rows.lock().unwrap().remove(id);
        Ok(())
    }
}
