//! Wire-format codec contract.
//!
//! The concrete serialization format (JSON, protobuf, ...) is an external
//! collaborator. The core depends only on these two traits.

use crate::message::BoxedMessage;
use crate::transport::IncomingPackage;

#[derive(Debug, thiserror::Error)]
#[error("failed to decode package {package_id} (trace {trace_id}): {reason}")]
pub struct DecodeFailed {
    pub package_id: String,
    pub trace_id: String,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to encode message of type {type_key}: {reason}")]
pub struct EncodeFailed {
    pub type_key: &'static str,
    pub reason: String,
}

/// Decodes a transport package into a typed domain message.
pub trait MessageDecoder: Send + Sync {
    fn decode(&self, pkg: &dyn IncomingPackage) -> Result<BoxedMessage, DecodeFailed>;
}

/// Encodes a typed domain message into transport bytes.
pub trait MessageEncoder: Send + Sync {
    fn encode(&self, message: &dyn crate::message::Message) -> Result<Vec<u8>, EncodeFailed>;
}
