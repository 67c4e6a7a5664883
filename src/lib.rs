//! Message-processing and saga-orchestration core for a service-bus
//! framework: decode transport packages, route them to handlers, run those
//! handlers under a context that can emit further commands/events, and
//! manage long-lived saga lifecycles on top of durable storage.

pub mod cancellation;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod context;
pub mod executor;
pub mod logging;
pub mod message;
pub mod processor;
pub mod replay;
pub mod resolver;
pub mod retry;
pub mod router;
pub mod saga;
pub mod snapshot;
pub mod transport;
pub mod validation;

#[cfg(feature = "test-utils")]
pub mod test_support;

pub use catalog::{HandlerCatalog, HandlerDescriptor, HandlerOptions};
pub use context::KernelContext;
pub use executor::MessageExecutor;
pub use message::{Message, MessageKind};
pub use processor::EntryPointProcessor;
pub use router::{EndpointRouter, Router};
pub use saga::{SagaId, SagaProvider, SagaStore};
