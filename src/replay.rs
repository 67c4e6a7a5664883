//! EventStream / AggregateReplay: fast-forwarding an aggregate from its
//! latest snapshot plus whatever events postdate it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::message::Message;
use crate::saga::StorageError;
use crate::snapshot::{Snapshot, SnapshotStore};

/// One event as returned by the stream, tagged with the aggregate version it
/// produced.
pub struct VersionedEvent {
    pub version: u64,
    pub message: Box<dyn Message>,
}

#[derive(Debug, thiserror::Error)]
pub enum EventStreamError {
    #[error("event stream read failed: {0}")]
    ReadFailed(String),
}

/// Ordered event history for an aggregate, read forward from a given
/// version (exclusive).
#[async_trait]
pub trait EventStream: Send + Sync {
    async fn events_since(
        &self,
        aggregate_id: &str,
        version: u64,
    ) -> Result<Vec<VersionedEvent>, EventStreamError>;
}

#[derive(Debug, thiserror::Error)]
#[error("failed to decode snapshot: {0}")]
pub struct SnapshotDecodeError(pub String);

/// Per-aggregate-type construction and snapshot decoding, mirroring
/// `saga::SagaFactory`.
pub trait AggregateFactory: Send + Sync {
    type Aggregate: Aggregate;

    fn new_instance(&self) -> Self::Aggregate;
    fn decode(&self, bytes: &[u8]) -> Result<Self::Aggregate, SnapshotDecodeError>;
}

/// An aggregate that can fold events onto its current state.
pub trait Aggregate: Send + Sync {
    fn version(&self) -> u64;
    fn apply(&mut self, version: u64, event: &dyn Message);
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    EventStream(#[from] EventStreamError),

    #[error(transparent)]
    Decode(#[from] SnapshotDecodeError),
}

/// Rebuilds an aggregate: load its latest snapshot (if any), then apply only
/// the events strictly newer than the snapshot's version.
pub struct AggregateReplay<F: AggregateFactory> {
    snapshots: Arc<dyn SnapshotStore>,
    events: Arc<dyn EventStream>,
    factory: F,
}

impl<F: AggregateFactory> AggregateReplay<F> {
    pub fn new(snapshots: Arc<dyn SnapshotStore>, events: Arc<dyn EventStream>, factory: F) -> Self {
        Self {
            snapshots,
            events,
            factory,
        }
    }

    pub async fn replay(&self, aggregate_id: &str) -> Result<F::Aggregate, ReplayError> {
        let (mut aggregate, base_version): (F::Aggregate, u64) =
            match self.snapshots.load(aggregate_id).await? {
                Some(Snapshot { payload, version, .. }) => (self.factory.decode(&payload)?, version),
                None => (self.factory.new_instance(), 0),
            };

        let events = self.events.events_since(aggregate_id, base_version).await?;
        for versioned in events {
            if versioned.version <= base_version {
                continue;
            }
            aggregate.apply(versioned.version, versioned.message.as_ref());
        }

        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::message::MessageKind;

    use super::*;

    #[derive(Debug)]
    struct Incremented;
    impl Message for Incremented {
        fn type_key(&self) -> &'static str {
            "test.Incremented"
        }
        fn kind(&self) -> MessageKind {
            MessageKind::Event
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Counter {
        version: u64,
        value: u64,
    }
    impl Aggregate for Counter {
        fn version(&self) -> u64 {
            self.version
        }
        fn apply(&mut self, version: u64, _event: &dyn Message) {
            self.value += 1;
            self.version = version;
        }
    }

    struct CounterFactory;
    impl AggregateFactory for CounterFactory {
        type Aggregate = Counter;
        fn new_instance(&self) -> Counter {
            Counter { version: 0, value: 0 }
        }
        fn decode(&self, bytes: &[u8]) -> Result<Counter, SnapshotDecodeError> {
            let value = u64::from_le_bytes(bytes[..8].try_into().unwrap());
            let version = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
            Ok(Counter { version, value })
        }
    }

    #[derive(Default)]
    struct FakeSnapshotStore {
        rows: Mutex<HashMap<String, Snapshot>>,
    }
    #[async_trait]
    impl SnapshotStore for FakeSnapshotStore {
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

    struct FakeEventStream {
        events: Vec<(u64, &'static str)>,
    }
    #[async_trait]
    impl EventStream for FakeEventStream {
        async fn events_since(
            &self,
            _aggregate_id: &str,
            version: u64,
        ) -> Result<Vec<VersionedEvent>, EventStreamError> {
            Ok(self
                .events
                .iter()
                .filter(|(v, _)| *v > version)
                .map(|(v, _)| VersionedEvent {
                    version: *v,
                    message: Box::new(Incremented),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn replay_from_snapshot_applies_only_newer_events() {
        let snapshots = Arc::new(FakeSnapshotStore::default());
        let mut payload = 3u64.to_le_bytes().to_vec();
        payload.extend_from_slice(&2u64.to_le_bytes());
        snapshots
            .save(Snapshot {
                aggregate_id: "agg-1".to_string(),
                version: 2,
                payload,
            })
            .await
            .unwrap();

        let events = Arc::new(FakeEventStream {
            events: vec![(1, "old"), (2, "at-snapshot"), (3, "new")],
        });

        let replay = AggregateReplay::new(snapshots, events, CounterFactory);
        let counter = replay.replay("agg-1").await.unwrap();

        assert_eq!(counter.version, 3);
        assert_eq!(counter.value, 4);
    }

    #[tokio::test]
    async fn replay_with_no_snapshot_starts_from_zero() {
        let snapshots = Arc::new(FakeSnapshotStore::default());
        let events = Arc::new(FakeEventStream {
            events: vec![(1, "a"), (2, "b")],
        });

        let replay = AggregateReplay::new(snapshots, events, CounterFactory);
        let counter = replay.replay("agg-2").await.unwrap();

        assert_eq!(counter.version, 2);
        assert_eq!(counter.value, 2);
    }
}
