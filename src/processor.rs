//! EntryPointProcessor: the per-package pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cancellation::{CancellationSource, CancellationToken};
use crate::codec::MessageDecoder;
use crate::executor::{ContextFactory, MessageExecutor};
use crate::logging::{LogLevel, LogSink};
use crate::resolver::DependencyResolver;
use crate::router::{EndpointRouter, Router};
use crate::transport::{IncomingPackage, OutgoingTransport, TransportError};

/// Drives one package through decode -> route -> fan-out -> ack.
///
/// Holds no mutable per-instance state beyond its injected collaborators, so
/// `handle` is safe to call concurrently for distinct packages.
pub struct EntryPointProcessor {
    decoder: Arc<dyn MessageDecoder>,
    router: Arc<Router>,
    endpoint_router: Arc<EndpointRouter>,
    outgoing: Arc<dyn OutgoingTransport>,
    encoder: Arc<dyn crate::codec::MessageEncoder>,
    log_sink: Arc<dyn LogSink>,
    resolver: DependencyResolver,
}

impl EntryPointProcessor {
    pub fn new(
        decoder: Arc<dyn MessageDecoder>,
        router: Arc<Router>,
        endpoint_router: Arc<EndpointRouter>,
        outgoing: Arc<dyn OutgoingTransport>,
        encoder: Arc<dyn crate::codec::MessageEncoder>,
        log_sink: Arc<dyn LogSink>,
        resolver: DependencyResolver,
    ) -> Self {
        Self {
            decoder,
            router,
            endpoint_router,
            outgoing,
            encoder,
            log_sink,
            resolver,
        }
    }

    /// Process one package with no external cancellation source.
    pub async fn handle(&self, pkg: Box<dyn IncomingPackage>) -> Result<(), TransportError> {
        let (_source, token) = CancellationSource::new();
        self.handle_cancellable(pkg, token).await
    }

    /// Process one package, observing `cancellation`. A cancelled run still acks or nacks exactly once, deciding
    /// nack-with-requeue.
    pub async fn handle_cancellable(
        &self,
        pkg: Box<dyn IncomingPackage>,
        cancellation: CancellationToken,
    ) -> Result<(), TransportError> {
        let package_id = pkg.id().to_string();
        let trace_id = pkg.trace_id().to_string();

        // Step 1: decode.
        let message = match self.decoder.decode(pkg.as_ref()) {
            Ok(message) => message,
            Err(err) => {
                let mut extra = HashMap::new();
                extra.insert("package_id".to_string(), package_id.clone());
                extra.insert("trace_id".to_string(), trace_id.clone());
                self.log_sink.log(
                    "default",
                    LogLevel::Error,
                    &format!("failed to decode package: {err}"),
                    &extra,
                );
                // A malformed message must not poison the queue.
                pkg.ack().await?;
                return Ok(());
            }
        };

        // Step 2: route.
        let executors = self.router.match_message(message.as_ref());
        if executors.is_empty() {
            self.log_sink.log(
                "default",
                LogLevel::Debug,
                &format!("no handlers registered for {}", message.type_key()),
                &HashMap::new(),
            );
        }

        // Step 3: fan out, sequentially in router order. One executor's
        // failure does not abort the rest.
        for descriptor in executors {
            if cancellation.is_cancelled() {
                break;
            }
            let channel = descriptor.options.logger_channel.clone();
            let executor = MessageExecutor::new(descriptor, self.resolver.clone());
            let context_factory = ContextFactory {
                package_id: package_id.clone(),
                package_trace_id: trace_id.clone(),
                endpoint_router: self.endpoint_router.clone(),
                outgoing: self.outgoing.clone(),
                encoder: self.encoder.clone(),
                log_sink: self.log_sink.clone(),
                cancellation: cancellation.clone(),
            };

            if let Err(err) = executor.execute(message.as_ref(), &context_factory).await {
                let mut extra = HashMap::new();
                extra.insert("package_id".to_string(), package_id.clone());
                extra.insert("trace_id".to_string(), trace_id.clone());
                self.log_sink
                    .log(&channel, LogLevel::Error, &format!("handler failed: {err}"), &extra);
            }
        }

        // Step 4: ack, unless cancellation requested a requeue instead.
        if cancellation.is_cancelled() {
            pkg.nack(true).await?;
        } else {
            pkg.ack().await?;
        }
        Ok(())
    }
}
