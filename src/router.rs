//! Router and EndpointRouter.

use std::collections::HashMap;

use crate::catalog::{HandlerCatalog, HandlerDescriptor};
use crate::message::{matches_type, Message};

/// Immutable routing table from message type to ordered handler descriptors.
///
/// `match_message` returns executors whose declared parameter type is the
/// message's own type or any of its supertypes, with supertype handlers
/// ordered before subtype (exact-type) handlers, ties broken by the
/// handler's original registration index.
#[derive(Debug, Clone)]
pub struct Router {
    catalog: HandlerCatalog,
}

impl Router {
    pub fn new(catalog: HandlerCatalog) -> Self {
        Self { catalog }
    }

    /// Returns the deterministic, ordered list of handlers matching `message`.
    pub fn match_message(&self, message: &dyn Message) -> Vec<HandlerDescriptor> {
        let mut supertype_matches = Vec::new();
        let mut exact_matches = Vec::new();

        for entry in self.catalog.entries() {
            if !matches_type(message, entry.message_type) {
                continue;
            }
            if entry.message_type == message.type_key() {
                exact_matches.push(entry.clone());
            } else {
                supertype_matches.push(entry.clone());
            }
        }

        supertype_matches.extend(exact_matches);
        supertype_matches
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("no endpoint configured for message type {0}")]
    NotConfigured(&'static str),

    #[error("command type {0} must route to exactly one endpoint, found {1}")]
    AmbiguousCommand(&'static str, usize),
}

/// A named transport destination (e.g. queue or topic name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRef {
    pub name: String,
}

impl EndpointRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Immutable outgoing routing table: message type -> destination endpoints.
///
/// Publishing an event may fan out to multiple endpoints; a command must
/// resolve to exactly one.
#[derive(Debug, Clone, Default)]
pub struct EndpointRouter {
    table: HashMap<&'static str, Vec<EndpointRef>>,
}

impl EndpointRouter {
    pub fn builder() -> EndpointRouterBuilder {
        EndpointRouterBuilder::default()
    }

    /// All endpoints registered for `type_key`, in registration order.
    pub fn endpoints_for(&self, type_key: &'static str) -> &[EndpointRef] {
        self.table
            .get(type_key)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve exactly one endpoint, as required by `send`.
    pub fn resolve_single(&self, type_key: &'static str) -> Result<&EndpointRef, EndpointError> {
        match self.endpoints_for(type_key) {
            [] => Err(EndpointError::NotConfigured(type_key)),
            [only] => Ok(only),
            many => Err(EndpointError::AmbiguousCommand(type_key, many.len())),
        }
    }
}

#[derive(Default)]
pub struct EndpointRouterBuilder {
    table: HashMap<&'static str, Vec<EndpointRef>>,
}

impl EndpointRouterBuilder {
    pub fn route(mut self, type_key: &'static str, endpoint: EndpointRef) -> Self {
        self.table.entry(type_key).or_default().push(endpoint);
        self
    }

    pub fn build(self) -> EndpointRouter {
        EndpointRouter { table: self.table }
    }
}
