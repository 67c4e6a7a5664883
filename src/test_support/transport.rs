//! In-memory transport test doubles.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};

use crate::transport::{IncomingPackage, OutgoingPackage, OutgoingTransport, Result, TransportError};

/// A canned inbound package plus the ack/nack outcome observers can inspect
/// afterward.
pub struct MockIncomingPackage {
    id: String,
    trace_id: String,
    payload: Vec<u8>,
    headers: HashMap<String, String>,
    settled: Mutex<Option<Settlement>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Acked,
    Nacked { requeue: bool },
}

impl MockIncomingPackage {
    pub fn new(id: impl Into<String>, trace_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            trace_id: trace_id.into(),
            payload,
            headers: HashMap::new(),
            settled: Mutex::new(None),
        }
    }

    /// Convenience constructor for tests that don't care about the exact
    /// id/trace id, only that each package gets a distinct one.
    pub fn with_random_id(payload: Vec<u8>) -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            uuid::Uuid::new_v4().to_string(),
            payload,
        )
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn settlement(&self) -> Option<Settlement> {
        *self.settled.lock().unwrap()
    }
}

#[async_trait]
impl IncomingPackage for MockIncomingPackage {
    fn id(&self) -> &str {
        &self.id
    }
    fn trace_id(&self) -> &str {
        &self.trace_id
    }
    fn payload(&self) -> &[u8] {
        &self.payload
    }
    fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    async fn ack(&self) -> Result<()> {
        *self.settled.lock().unwrap() = Some(Settlement::Acked);
        Ok(())
    }

    async fn nack(&self, requeue: bool) -> Result<()> {
        *self.settled.lock().unwrap() = Some(Settlement::Nacked { requeue });
        Ok(())
    }
}

/// Records every package handed to `send`, optionally failing on demand.
#[derive(Default)]
pub struct MockOutgoingTransport {
    sent: Mutex<Vec<OutgoingPackage>>,
    fail_next: Mutex<Option<String>>,
}

impl MockOutgoingTransport {
    pub fn sent(&self) -> Vec<OutgoingPackage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_next_send(&self, reason: impl Into<String>) {
        *self.fail_next.lock().unwrap() = Some(reason.into());
    }
}

#[async_trait]
impl OutgoingTransport for MockOutgoingTransport {
    async fn send(&self, pkg: OutgoingPackage) -> Result<()> {
        if let Some(reason) = self.fail_next.lock().unwrap().take() {
            return Err(TransportError::SendFailed(reason));
        }
        self.sent.lock().unwrap().push(pkg);
        Ok(())
    }
}

/// Replays a fixed list of packages, then ends the stream. `consume` drains
/// the list; calling it twice yields the second list empty.
pub struct MockIncomingTransport {
    packages: Mutex<Vec<Box<dyn IncomingPackage>>>,
}

impl MockIncomingTransport {
    pub fn new(packages: Vec<Box<dyn IncomingPackage>>) -> Self {
        Self {
            packages: Mutex::new(packages),
        }
    }
}

impl crate::transport::IncomingTransport for MockIncomingTransport {
    fn consume(&self) -> BoxStream<'_, Box<dyn IncomingPackage>> {
        let drained = std::mem::take(&mut *self.packages.lock().unwrap());
        Box::pin(stream::iter(drained))
    }
}
