//! Static handler catalog.
//!
//! In the source framework this table is built by scanning annotations at
//! startup. Here it is built explicitly, once, by whatever bootstrap
//! collaborator assembles the application and handed to the `Router` as a frozen
//! `HandlerCatalog`.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::KernelContext;
use crate::message::Message;
use crate::resolver::DependencyResolver;
use crate::validation::ValidationFailure;

/// Context handed to a `defaultThrowableEvent` factory.
#[derive(Debug, Clone)]
pub struct ThrownContext {
    pub message_type: &'static str,
    pub throwable: String,
    pub trace_id: String,
}

/// Builds a fallback event from a validation failure or a thrown error,
/// standing in for the source's `type|nil` notation for "an event class".
pub type ValidationEventFactory =
    Arc<dyn Fn(&ValidationFailure) -> Box<dyn Message> + Send + Sync>;
pub type ThrowableEventFactory = Arc<dyn Fn(&ThrownContext) -> Box<dyn Message> + Send + Sync>;

/// Per-handler configuration.
#[derive(Clone)]
pub struct HandlerOptions {
    pub validate: bool,
    pub validation_groups: Vec<String>,
    pub default_validation_failed_event: Option<ValidationEventFactory>,
    pub default_throwable_event: Option<ThrowableEventFactory>,
    pub logger_channel: String,
    pub description: String,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            validate: false,
            validation_groups: Vec::new(),
            default_validation_failed_event: None,
            default_throwable_event: None,
            logger_channel: "default".to_string(),
            description: String::new(),
        }
    }
}

impl std::fmt::Debug for HandlerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerOptions")
            .field("validate", &self.validate)
            .field("validation_groups", &self.validation_groups)
            .field(
                "default_validation_failed_event",
                &self.default_validation_failed_event.is_some(),
            )
            .field(
                "default_throwable_event",
                &self.default_throwable_event.is_some(),
            )
            .field("logger_channel", &self.logger_channel)
            .field("description", &self.description)
            .finish()
    }
}

/// Distinguishes an argument-resolution failure from an error the handler
/// body itself threw.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error(transparent)]
    ArgumentResolutionFailed(#[from] crate::resolver::ArgumentResolutionFailed),

    #[error("handler threw: {0}")]
    Thrown(Box<dyn std::error::Error + Send + Sync>),
}

/// The user handler's invocation signature: `(message, context, resolver) ->
/// Future<()>`. Handlers resolve their own declared dependencies from
/// `resolver` inside their registration wrapper.
pub type HandlerInvoke = Arc<
    dyn for<'a> Fn(
            &'a dyn Message,
            &'a KernelContext,
            &'a DependencyResolver,
        ) -> BoxFuture<'a, Result<(), InvokeError>>
        + Send
        + Sync,
>;

/// One registered handler, with its declared message type and options.
#[derive(Clone)]
pub struct HandlerDescriptor {
    pub message_type: &'static str,
    pub invoke: HandlerInvoke,
    pub options: HandlerOptions,
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("message_type", &self.message_type)
            .field("options", &self.options)
            .finish()
    }
}

/// Ordered, immutable map of message type -> handlers, built once at startup.
///
/// Iteration order within a message type is declaration order, so dispatch
/// is deterministic and reproducible across runs.
#[derive(Debug, Clone, Default)]
pub struct HandlerCatalog {
    entries: Vec<HandlerDescriptor>,
}

impl HandlerCatalog {
    pub fn builder() -> HandlerCatalogBuilder {
        HandlerCatalogBuilder::default()
    }

    pub fn entries(&self) -> &[HandlerDescriptor] {
        &self.entries
    }
}

/// Accumulates handler registrations in declaration order before freezing
/// them into a `HandlerCatalog`.
#[derive(Default)]
pub struct HandlerCatalogBuilder {
    entries: Vec<HandlerDescriptor>,
}

impl HandlerCatalogBuilder {
    pub fn register(mut self, descriptor: HandlerDescriptor) -> Self {
        self.entries.push(descriptor);
        self
    }

    pub fn build(self) -> HandlerCatalog {
        HandlerCatalog {
            entries: self.entries,
        }
    }
}
