//! Per-saga-id serialization.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use super::model::SagaId;

#[derive(Default)]
pub struct SagaLocks {
    inner: Mutex<HashMap<SagaId, Arc<Mutex<()>>>>,
}

impl SagaLocks {
    /// Blocks until no other in-flight call holds this saga id, then returns
    /// a guard that releases the lock on drop. Distinct saga ids never wait
    /// on each other.
    pub async fn acquire(&self, id: &SagaId) -> OwnedMutexGuard<()> {
        let entry = {
            let mut table = self.inner.lock().await;
            table
                .entry(id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }
}
