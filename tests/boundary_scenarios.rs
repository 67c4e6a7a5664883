//! Literal boundary scenarios from the engine's testable-properties section:
//! undecodable payloads, missing handlers, partial handler failure, saga
//! start delivery order/duplicate, and transient-store retry.
#![cfg(feature = "test-utils")]

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use service_bus_core::catalog::{HandlerCatalog, HandlerDescriptor, HandlerOptions, InvokeError};
use service_bus_core::codec::{DecodeFailed, EncodeFailed, MessageDecoder, MessageEncoder};
use service_bus_core::message::{BoxedMessage, Message, MessageKind};
use service_bus_core::resolver::DependencyResolver;
use service_bus_core::router::{EndpointRouter, Router};
use service_bus_core::saga::{SagaId, SagaMetadata, SagaProvider, SagaProviderError, SagaState};
use service_bus_core::test_support::{MockIncomingPackage, MockOutgoingTransport, MockSagaStore, Settlement};
use service_bus_core::transport::IncomingPackage;
use service_bus_core::EntryPointProcessor;

#[derive(Debug)]
struct Foo;
impl Message for Foo {
    fn type_key(&self) -> &'static str {
        "test.Foo"
    }
    fn kind(&self) -> MessageKind {
        MessageKind::Event
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct AlwaysFooDecoder;
impl MessageDecoder for AlwaysFooDecoder {
    fn decode(&self, _pkg: &dyn IncomingPackage) -> Result<BoxedMessage, DecodeFailed> {
        Ok(Box::new(Foo))
    }
}

struct RejectingDecoder;
impl MessageDecoder for RejectingDecoder {
    fn decode(&self, pkg: &dyn IncomingPackage) -> Result<BoxedMessage, DecodeFailed> {
        Err(DecodeFailed {
            package_id: pkg.id().to_string(),
            trace_id: pkg.trace_id().to_string(),
            reason: "malformed payload".to_string(),
        })
    }
}

struct NullEncoder;
impl MessageEncoder for NullEncoder {
    fn encode(&self, _message: &dyn Message) -> Result<Vec<u8>, EncodeFailed> {
        Ok(Vec::new())
    }
}

fn processor_with(
    decoder: Arc<dyn MessageDecoder>,
    catalog: HandlerCatalog,
) -> (Arc<MockOutgoingTransport>, EntryPointProcessor) {
    let outgoing = Arc::new(MockOutgoingTransport::default());
    let processor = EntryPointProcessor::new(
        decoder,
        Arc::new(Router::new(catalog)),
        Arc::new(EndpointRouter::builder().build()),
        outgoing.clone(),
        Arc::new(NullEncoder),
        Arc::new(service_bus_core::logging::TracingLogSink),
        DependencyResolver::builder().build(),
    );
    (outgoing, processor)
}

/// S1: undecodable payload: one error log, `ack()` exactly once, no
/// executors invoked.
#[tokio::test]
async fn s1_undecodable_payload_acks_exactly_once() {
    let (_outgoing, processor) = processor_with(Arc::new(RejectingDecoder), HandlerCatalog::builder().build());
    let pkg = Arc::new(MockIncomingPackage::new("p1", "t1", vec![0xFF]));

    struct Wrapper(Arc<MockIncomingPackage>);
    #[async_trait]
    impl IncomingPackage for Wrapper {
        fn id(&self) -> &str {
            self.0.id()
        }
        fn trace_id(&self) -> &str {
            self.0.trace_id()
        }
        fn payload(&self) -> &[u8] {
            self.0.payload()
        }
        fn headers(&self) -> &HashMap<String, String> {
            self.0.headers()
        }
        async fn ack(&self) -> service_bus_core::transport::Result<()> {
            self.0.ack().await
        }
        async fn nack(&self, requeue: bool) -> service_bus_core::transport::Result<()> {
            self.0.nack(requeue).await
        }
    }

    processor.handle(Box::new(Wrapper(pkg.clone()))).await.unwrap();
    assert_eq!(pkg.settlement(), Some(Settlement::Acked));
}

fn ok_descriptor(message_type: &'static str, calls: Arc<AtomicU32>) -> HandlerDescriptor {
    HandlerDescriptor {
        message_type,
        invoke: Arc::new(move |_msg, _ctx, _resolver| {
            let calls = calls.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }) as BoxFuture<'_, Result<(), InvokeError>>
        }),
        options: HandlerOptions::default(),
    }
}

/// S2: no handlers registered for the decoded type still acks once.
#[tokio::test]
async fn s2_no_handlers_still_acks() {
    let (_outgoing, processor) = processor_with(Arc::new(AlwaysFooDecoder), HandlerCatalog::builder().build());
    let pkg = Arc::new(MockIncomingPackage::new("p2", "t2", Vec::new()));

    struct Wrapper(Arc<MockIncomingPackage>);
    #[async_trait]
    impl IncomingPackage for Wrapper {
        fn id(&self) -> &str {
            self.0.id()
        }
        fn trace_id(&self) -> &str {
            self.0.trace_id()
        }
        fn payload(&self) -> &[u8] {
            self.0.payload()
        }
        fn headers(&self) -> &HashMap<String, String> {
            self.0.headers()
        }
        async fn ack(&self) -> service_bus_core::transport::Result<()> {
            self.0.ack().await
        }
        async fn nack(&self, requeue: bool) -> service_bus_core::transport::Result<()> {
            self.0.nack(requeue).await
        }
    }

    processor.handle(Box::new(Wrapper(pkg.clone()))).await.unwrap();
    assert_eq!(pkg.settlement(), Some(Settlement::Acked));
}

/// S3: second handler throwing does not stop the first from running, and
/// the package is still acked exactly once.
#[tokio::test]
async fn s3_second_handler_throws_first_still_runs_and_package_acks() {
    let h1_calls = Arc::new(AtomicU32::new(0));
    let h1 = ok_descriptor("test.Foo", h1_calls.clone());
    let h2 = HandlerDescriptor {
        message_type: "test.Foo",
        invoke: Arc::new(|_msg, _ctx, _resolver| {
            Box::pin(async { Err(InvokeError::Thrown("boom".into())) }) as BoxFuture<'_, Result<(), InvokeError>>
        }),
        options: HandlerOptions::default(),
    };
    let catalog = HandlerCatalog::builder().register(h1).register(h2).build();
    let (_outgoing, processor) = processor_with(Arc::new(AlwaysFooDecoder), catalog);
    let pkg = Arc::new(MockIncomingPackage::new("p3", "t3", Vec::new()));

    struct Wrapper(Arc<MockIncomingPackage>);
    #[async_trait]
    impl IncomingPackage for Wrapper {
        fn id(&self) -> &str {
            self.0.id()
        }
        fn trace_id(&self) -> &str {
            self.0.trace_id()
        }
        fn payload(&self) -> &[u8] {
            self.0.payload()
        }
        fn headers(&self) -> &HashMap<String, String> {
            self.0.headers()
        }
        async fn ack(&self) -> service_bus_core::transport::Result<()> {
            self.0.ack().await
        }
        async fn nack(&self, requeue: bool) -> service_bus_core::transport::Result<()> {
            self.0.nack(requeue).await
        }
    }

    processor.handle(Box::new(Wrapper(pkg.clone()))).await.unwrap();
    assert_eq!(h1_calls.load(Ordering::SeqCst), 1, "H1 still ran");
    assert_eq!(pkg.settlement(), Some(Settlement::Acked));
}

#[derive(Debug)]
struct StartOrder {
    order_id: String,
}
impl Message for StartOrder {
    fn type_key(&self) -> &'static str {
        "test.StartOrder"
    }
    fn kind(&self) -> MessageKind {
        MessageKind::Command
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct OrderSaga {
    state: SagaState,
}
impl service_bus_core::saga::Saga for OrderSaga {
    fn state(&self) -> &SagaState {
        &self.state
    }
    fn state_mut(&mut self) -> &mut SagaState {
        &mut self.state
    }
    fn start(&mut self, _trigger: &dyn Message) -> Result<(), service_bus_core::saga::SagaError> {
        Ok(())
    }
    fn encode(&self) -> Vec<u8> {
        Vec::new()
    }
}

struct OrderSagaFactory;
impl service_bus_core::saga::SagaFactory for OrderSagaFactory {
    fn saga_class(&self) -> &'static str {
        "test.OrderSaga"
    }
    fn new_instance(
        &self,
        id: SagaId,
        created_at: chrono::DateTime<chrono::Utc>,
        expire_date: chrono::DateTime<chrono::Utc>,
    ) -> Box<dyn service_bus_core::saga::Saga> {
        Box::new(OrderSaga {
            state: SagaState::new(id, created_at, expire_date),
        })
    }
    fn decode(
        &self,
        _bytes: &[u8],
    ) -> Result<Box<dyn service_bus_core::saga::Saga>, service_bus_core::saga::SagaDecodeError> {
        unimplemented!("not exercised in these scenarios")
    }
}

fn saga_test_context() -> service_bus_core::KernelContext {
    let (_source, token) = service_bus_core::cancellation::CancellationSource::new();
    service_bus_core::KernelContext::new(
        "pkg-1",
        "trace-1",
        Arc::new(EndpointRouter::builder().build()),
        Arc::new(MockOutgoingTransport::default()),
        Arc::new(NullEncoder),
        Arc::new(service_bus_core::logging::TracingLogSink),
        HandlerOptions::default(),
        token,
    )
}

#[derive(Debug)]
struct ReserveStockCmd;
impl Message for ReserveStockCmd {
    fn type_key(&self) -> &'static str {
        "test.ReserveStockCmd"
    }
    fn kind(&self) -> MessageKind {
        MessageKind::Command
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
struct OrderStarted;
impl Message for OrderStarted {
    fn type_key(&self) -> &'static str {
        "test.OrderStarted"
    }
    fn kind(&self) -> MessageKind {
        MessageKind::Event
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A saga whose `start` both fires a command and raises an event, so
/// delivery order and draining can be observed.
struct DeliveringOrderSaga {
    state: SagaState,
}
impl service_bus_core::saga::Saga for DeliveringOrderSaga {
    fn state(&self) -> &SagaState {
        &self.state
    }
    fn state_mut(&mut self) -> &mut SagaState {
        &mut self.state
    }
    fn start(&mut self, _trigger: &dyn Message) -> Result<(), service_bus_core::saga::SagaError> {
        self.state.fire_command(Box::new(ReserveStockCmd));
        self.state.raise_event(Box::new(OrderStarted));
        Ok(())
    }
    fn encode(&self) -> Vec<u8> {
        Vec::new()
    }
}

struct DeliveringOrderSagaFactory;
impl service_bus_core::saga::SagaFactory for DeliveringOrderSagaFactory {
    fn saga_class(&self) -> &'static str {
        "test.DeliveringOrderSaga"
    }
    fn new_instance(
        &self,
        id: SagaId,
        created_at: chrono::DateTime<chrono::Utc>,
        expire_date: chrono::DateTime<chrono::Utc>,
    ) -> Box<dyn service_bus_core::saga::Saga> {
        Box::new(DeliveringOrderSaga {
            state: SagaState::new(id, created_at, expire_date),
        })
    }
    fn decode(
        &self,
        _bytes: &[u8],
    ) -> Result<Box<dyn service_bus_core::saga::Saga>, service_bus_core::saga::SagaDecodeError> {
        unimplemented!("not exercised in this scenario")
    }
}

/// S4: starting a saga persists it, then delivers its fired commands before
/// its raised events, then drains both queues.
#[tokio::test]
async fn s4_start_delivers_fired_commands_then_raised_events_in_order() {
    let store = Arc::new(MockSagaStore::default());
    let provider = SagaProvider::builder()
        .store(store)
        .register_class(
            Arc::new(DeliveringOrderSagaFactory),
            SagaMetadata {
                expire_date_modifier: chrono::Duration::seconds(60),
                id_field_in_message: "order_id".to_string(),
            },
        )
        .build();

    let outgoing = Arc::new(MockOutgoingTransport::default());
    let (_source, token) = service_bus_core::cancellation::CancellationSource::new();
    let ctx = service_bus_core::KernelContext::new(
        "pkg-1",
        "trace-1",
        Arc::new(
            EndpointRouter::builder()
                .route(
                    "test.ReserveStockCmd",
                    service_bus_core::router::EndpointRef::new("stock-queue"),
                )
                .route(
                    "test.OrderStarted",
                    service_bus_core::router::EndpointRef::new("notify-queue"),
                )
                .build(),
        ),
        outgoing.clone(),
        Arc::new(NullEncoder),
        Arc::new(service_bus_core::logging::TracingLogSink),
        HandlerOptions::default(),
        token,
    );
    let id = SagaId::new("order-9", "test.DeliveringOrderSaga");
    let trigger = StartOrder {
        order_id: "order-9".to_string(),
    };

    let saga = provider.start(id, &trigger, &ctx).await.unwrap();
    assert!(saga.fired_commands().is_empty(), "fired commands drained");
    assert!(saga.raised_events().is_empty(), "raised events drained");

    let sent = outgoing.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].destination, "stock-queue", "command delivered first");
    assert_eq!(sent[1].destination, "notify-queue", "event delivered second");
}

/// S5: a duplicate saga start surfaces `DuplicateSagaId` and never attempts
/// delivery.
#[tokio::test]
async fn s5_duplicate_start_is_rejected() {
    let store = Arc::new(MockSagaStore::default());
    let provider = SagaProvider::builder()
        .store(store)
        .register_class(
            Arc::new(OrderSagaFactory),
            SagaMetadata {
                expire_date_modifier: chrono::Duration::seconds(60),
                id_field_in_message: "order_id".to_string(),
            },
        )
        .build();
    let ctx = saga_test_context();
    let id = SagaId::new("order-1", "test.OrderSaga");
    let trigger = StartOrder {
        order_id: "order-1".to_string(),
    };

    provider.start(id.clone(), &trigger, &ctx).await.unwrap();
    let result = provider.start(id.clone(), &trigger, &ctx).await;
    assert!(matches!(result, Err(SagaProviderError::DuplicateSagaId(_))));
}

/// S7: a save that fails twice with a transient error succeeds on the
/// third attempt.
#[tokio::test]
async fn s7_transient_store_failure_is_retried() {
    let store = Arc::new(MockSagaStore::default());
    store.fail_next_with_connection_error();
    store.fail_next_with_connection_error();
    let provider = SagaProvider::builder()
        .store(store.clone())
        .retry_policy(service_bus_core::retry::RetryPolicy {
            delay: std::time::Duration::from_millis(1),
            max_attempts: 5,
        })
        .register_class(
            Arc::new(OrderSagaFactory),
            SagaMetadata {
                expire_date_modifier: chrono::Duration::seconds(60),
                id_field_in_message: "order_id".to_string(),
            },
        )
        .build();
    let ctx = saga_test_context();
    let id = SagaId::new("order-2", "test.OrderSaga");
    let trigger = StartOrder {
        order_id: "order-2".to_string(),
    };

    let result = provider.start(id.clone(), &trigger, &ctx).await;
    assert!(result.is_ok(), "succeeds after the transient failure clears");
    assert!(store.rows_snapshot().contains_key(&id));
}
