//! Transport contract.
//!
//! Transport drivers are external collaborators: the core only ever sees
//! `IncomingPackage`/`OutgoingPackage` and the ack/nack handles they expose.
//! A concrete AMQP-like broker lives outside this crate; `test_support`
//! ships an in-memory stand-in for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;

/// Errors surfaced by a transport driver.
///
/// This is the only error family that may escape `EntryPointProcessor::handle`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("ack failed for package {package_id}: {reason}")]
    AckFailed { package_id: String, reason: String },

    #[error("nack failed for package {package_id}: {reason}")]
    NackFailed { package_id: String, reason: String },

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// An inbound transport envelope.
///
/// Ack is idempotent: an implementation must ensure at most one terminal
/// acknowledgement per package.
#[async_trait]
pub trait IncomingPackage: Send + Sync {
    fn id(&self) -> &str;
    fn trace_id(&self) -> &str;
    fn payload(&self) -> &[u8];
    fn headers(&self) -> &HashMap<String, String>;

    /// Acknowledge successful processing. No-op if already terminally settled.
    async fn ack(&self) -> Result<()>;

    /// Reject processing, optionally requesting redelivery.
    async fn nack(&self, requeue: bool) -> Result<()>;
}

/// An outbound transport envelope, addressed to a named endpoint.
#[derive(Debug, Clone)]
pub struct OutgoingPackage {
    pub destination: String,
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub trace_id: String,
    pub delivery_delay: Option<std::time::Duration>,
}

/// Sends already-encoded envelopes to a named destination.
///
/// Implemented by the transport driver; the core talks to it only through
/// `EndpointRouter` + `KernelContext`.
#[async_trait]
pub trait OutgoingTransport: Send + Sync {
    async fn send(&self, pkg: OutgoingPackage) -> Result<()>;
}

/// Stream of inbound packages consumed by an `EntryPointProcessor`.
pub trait IncomingTransport: Send + Sync {
    fn consume(&self) -> BoxStream<'_, Box<dyn IncomingPackage>>;
}
