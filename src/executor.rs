//! MessageExecutor: wraps one handler invocation.

use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::catalog::{HandlerDescriptor, InvokeError, ThrownContext};
use crate::codec::MessageEncoder;
use crate::context::{ContextError, KernelContext};
use crate::logging::LogSink;
use crate::message::Message;
use crate::resolver::{ArgumentResolutionFailed, DependencyResolver};
use crate::router::EndpointRouter;
use crate::validation::ValidationFailure;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("validation failed: {0:?}")]
    ValidationFailed(ValidationFailure),

    #[error(transparent)]
    ArgumentResolutionFailed(#[from] ArgumentResolutionFailed),

    #[error("handler threw: {0}")]
    HandlerThrew(Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Everything needed to build a fresh `KernelContext` per executor
/// invocation.
#[derive(Clone)]
pub struct ContextFactory {
    pub package_id: String,
    pub package_trace_id: String,
    pub endpoint_router: Arc<EndpointRouter>,
    pub outgoing: Arc<dyn crate::transport::OutgoingTransport>,
    pub encoder: Arc<dyn MessageEncoder>,
    pub log_sink: Arc<dyn LogSink>,
    pub cancellation: CancellationToken,
}

impl ContextFactory {
    fn build(&self, options: crate::catalog::HandlerOptions) -> KernelContext {
        KernelContext::new(
            self.package_id.clone(),
            self.package_trace_id.clone(),
            self.endpoint_router.clone(),
            self.outgoing.clone(),
            self.encoder.clone(),
            self.log_sink.clone(),
            options,
            self.cancellation.clone(),
        )
    }
}

/// Wraps one `HandlerDescriptor` with its validation/dependency/error-
/// translation pipeline.
pub struct MessageExecutor {
    descriptor: HandlerDescriptor,
    resolver: DependencyResolver,
}

impl MessageExecutor {
    pub fn new(descriptor: HandlerDescriptor, resolver: DependencyResolver) -> Self {
        Self { descriptor, resolver }
    }

    pub fn options(&self) -> &crate::catalog::HandlerOptions {
        &self.descriptor.options
    }

    /// Runs the full per-handler pipeline.
    pub async fn execute(
        &self,
        message: &dyn Message,
        context_factory: &ContextFactory,
    ) -> Result<(), ExecutorError> {
        // Step 1: install this handler's options on a fresh context.
        let context = context_factory.build(self.descriptor.options.clone());

        // Step 2: validate, if configured.
        if self.descriptor.options.validate {
            let failure = message.validate(&self.descriptor.options.validation_groups);
            if !failure.is_valid() {
                if let Some(factory) = &self.descriptor.options.default_validation_failed_event {
                    let event = factory(&failure);
                    context.publish(event.as_ref(), None).await?;
                    return Ok(());
                }
                return Err(ExecutorError::ValidationFailed(failure));
            }
        }

        // Steps 3-4: invoke; the closure resolves its own declared
        // dependencies from `resolver` and raises `ArgumentResolutionFailed`
        // before running its body if one is missing.
        match (self.descriptor.invoke)(message, &context, &self.resolver).await {
            Ok(()) => Ok(()),
            Err(InvokeError::ArgumentResolutionFailed(e)) => Err(e.into()),
            Err(InvokeError::Thrown(throwable)) => {
                if let Some(factory) = &self.descriptor.options.default_throwable_event {
                    let thrown = ThrownContext {
                        message_type: message.type_key(),
                        throwable: throwable.to_string(),
                        trace_id: context_factory.package_trace_id.clone(),
                    };
                    let event = factory(&thrown);
                    context.publish(event.as_ref(), None).await?;
                    Ok(())
                } else {
                    Err(ExecutorError::HandlerThrew(throwable))
                }
            }
        }
    }
}
