//! Per-message execution context.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::catalog::HandlerOptions;
use crate::codec::MessageEncoder;
use crate::logging::{LogLevel, LogSink};
use crate::message::{Message, MessageKind};
use crate::router::{EndpointError, EndpointRouter};
use crate::transport::{OutgoingPackage, OutgoingTransport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    EndpointNotConfigured(#[from] EndpointError),

    #[error("failed to encode outgoing message {0}: {1}")]
    EncodeFailed(&'static str, String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("operation cancelled")]
    Cancelled,
}

/// Per-`send`/`publish`/`delivery` call overrides.
#[derive(Debug, Clone, Default)]
pub struct DeliveryOptions {
    /// Defaults to the incoming package's trace id when `None`.
    pub trace_id: Option<String>,
    pub headers: HashMap<String, String>,
    pub delivery_delay: Option<Duration>,
}

/// Per-message handle through which a handler emits further messages and
/// logs. Never shared across messages or handlers; the
/// `MessageExecutor` constructs one fresh instance per handler invocation
/// and installs that handler's options on it before calling in.
pub struct KernelContext {
    package_id: String,
    package_trace_id: String,
    endpoint_router: Arc<EndpointRouter>,
    outgoing: Arc<dyn OutgoingTransport>,
    encoder: Arc<dyn MessageEncoder>,
    log_sink: Arc<dyn LogSink>,
    options: HandlerOptions,
    cancellation: CancellationToken,
}

impl KernelContext {
    pub fn new(
        package_id: impl Into<String>,
        package_trace_id: impl Into<String>,
        endpoint_router: Arc<EndpointRouter>,
        outgoing: Arc<dyn OutgoingTransport>,
        encoder: Arc<dyn MessageEncoder>,
        log_sink: Arc<dyn LogSink>,
        options: HandlerOptions,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            package_id: package_id.into(),
            package_trace_id: package_trace_id.into(),
            endpoint_router,
            outgoing,
            encoder,
            log_sink,
            options,
            cancellation,
        }
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// The handler options installed by the executor for the handler
    /// currently running against this context.
    pub fn current_execution_options(&self) -> &HandlerOptions {
        &self.options
    }

    fn resolve_delivery_options(&self, opts: Option<DeliveryOptions>) -> DeliveryOptions {
        let mut opts = opts.unwrap_or_default();
        if opts.trace_id.is_none() {
            opts.trace_id = Some(self.package_trace_id.clone());
        }
        opts
    }

    fn build_package(
        &self,
        endpoint_name: &str,
        message: &dyn Message,
        opts: DeliveryOptions,
    ) -> Result<OutgoingPackage, ContextError> {
        if self.cancellation.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        let payload = self
            .encoder
            .encode(message)
            .map_err(|e| ContextError::EncodeFailed(message.type_key(), e.reason))?;
        Ok(OutgoingPackage {
            destination: endpoint_name.to_string(),
            payload,
            headers: opts.headers,
            trace_id: opts.trace_id.unwrap_or_else(|| self.package_trace_id.clone()),
            delivery_delay: opts.delivery_delay,
        })
    }

    /// Route `cmd` to exactly one endpoint. Fails with `EndpointNotConfigured`
    /// (or `AmbiguousCommand`) if zero or more than one endpoint matches.
    pub async fn send(
        &self,
        cmd: &dyn Message,
        opts: Option<DeliveryOptions>,
    ) -> Result<(), ContextError> {
        let endpoint = self.endpoint_router.resolve_single(cmd.type_key())?.clone();
        let opts = self.resolve_delivery_options(opts);
        let pkg = self.build_package(&endpoint.name, cmd, opts)?;
        self.outgoing.send(pkg).await?;
        Ok(())
    }

    /// Fan out `evt` to every matching endpoint. Zero matches is not an
    /// error, only a debug log.
    pub async fn publish(
        &self,
        evt: &dyn Message,
        opts: Option<DeliveryOptions>,
    ) -> Result<(), ContextError> {
        let endpoints = self.endpoint_router.endpoints_for(evt.type_key()).to_vec();
        if endpoints.is_empty() {
            self.log_debug(&format!(
                "no endpoints configured for event {}",
                evt.type_key()
            ));
            return Ok(());
        }
        let opts = self.resolve_delivery_options(opts);
        for endpoint in endpoints {
            let pkg = self.build_package(&endpoint.name, evt, opts.clone())?;
            self.outgoing.send(pkg).await?;
        }
        Ok(())
    }

    /// Polymorphic delivery: commands and queries route to exactly one
    /// endpoint, events fan out to all matches.
    pub async fn delivery(
        &self,
        message: &dyn Message,
        opts: Option<DeliveryOptions>,
    ) -> Result<(), ContextError> {
        match message.kind() {
            MessageKind::Event => self.publish(message, opts).await,
            MessageKind::Command | MessageKind::Query => self.send(message, opts).await,
        }
    }

    /// Log through the channel of the currently active handler's options.
    pub fn log_context_message(
        &self,
        level: LogLevel,
        text: &str,
        extra: &HashMap<String, String>,
    ) {
        self.log_sink
            .log(&self.options.logger_channel, level, text, extra);
    }

    fn log_debug(&self, text: &str) {
        self.log_context_message(LogLevel::Debug, text, &HashMap::new());
    }
}
