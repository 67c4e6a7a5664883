//! Test doubles for the engine's external collaborators.
//!
//! Gated behind the `test-utils` feature so they never ship in a production
//! build.

pub mod codec;
pub mod saga_store;
pub mod snapshot_store;
pub mod transport;

pub use codec::{JsonMessageCodec, JsonMessageCodecBuilder};
pub use saga_store::MockSagaStore;
pub use snapshot_store::MockSnapshotStore;
pub use transport::{MockIncomingPackage, MockIncomingTransport, MockOutgoingTransport, Settlement};
