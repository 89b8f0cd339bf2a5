//! End-to-end tests for publish/subscribe and notifications sharing a bus with RPC

use anyhow::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use ulink::proto::{Payload, UMessage, UMessageType, UPayloadFormat, UPriority, UUri};
use ulink::transport::{LocalBus, LocalTransport};
use ulink::{NotificationSink, NotificationSource, Publisher, RpcClient, RpcServer, Subscriber};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn service() -> UUri {
    UUri::new("vehicle", 0x0002_0001, 1, 0)
}

fn consumer() -> UUri {
    UUri::new("vehicle", 0x0001_0001, 1, 0)
}

fn endpoint(bus: &Arc<LocalBus>, entity: UUri) -> Arc<LocalTransport> {
    Arc::new(LocalTransport::new(entity, Arc::clone(bus)))
}

#[tokio::test]
async fn test_topic_and_rpc_traffic_stay_apart() -> Result<()> {
    init_tracing();
    let bus = LocalBus::new();
    let served = Arc::new(AtomicUsize::new(0));

    let calls = Arc::clone(&served);
    let _server = RpcServer::serve(endpoint(&bus, service()), service().with_resource(1), move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    })?;

    let received: Arc<Mutex<Vec<UMessage>>> = Arc::default();
    let inbox = Arc::clone(&received);
    let _subscriber = Subscriber::subscribe(
        endpoint(&bus, consumer()),
        service().with_resource(0x8001),
        move |message| inbox.lock().push(message),
    )?;

    let publisher = Publisher::new(
        endpoint(&bus, service()),
        service().with_resource(0x8001),
        UPayloadFormat::Text,
    )?;
    assert!(publisher.publish(Payload::text("speed=42")).is_ok());

    let client = RpcClient::new(
        endpoint(&bus, consumer()),
        service().with_resource(1),
        UPriority::Cs4,
        Duration::from_secs(5),
    )?;
    client.request()?.await?;

    assert_eq!(served.load(Ordering::SeqCst), 1);
    let received = received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].attributes.message_type, UMessageType::Publish);
    Ok(())
}

#[test]
fn test_notification_round_trip() -> Result<()> {
    init_tracing();
    let bus = LocalBus::new();
    let topic = service().with_resource(0x8002);

    let received: Arc<Mutex<Vec<UMessage>>> = Arc::default();
    let inbox = Arc::clone(&received);
    let sink = NotificationSink::create(endpoint(&bus, consumer()), topic.clone(), move |message| {
        inbox.lock().push(message)
    })?;

    let source = NotificationSource::new(endpoint(&bus, service()), topic, consumer())?;
    assert!(source.notify().is_ok());
    assert_eq!(received.lock().len(), 1);

    drop(sink);
    assert!(source.notify().is_ok());
    assert_eq!(received.lock().len(), 1);
    assert_eq!(bus.listener_count(), 0);
    Ok(())
}
