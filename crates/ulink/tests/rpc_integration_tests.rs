//! End-to-end tests for RPC clients and servers over the in-process transport

use anyhow::Result;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use ulink::proto::{Payload, UCode, UPayloadFormat, UPriority, UStatus, UUri};
use ulink::transport::{LocalBus, LocalTransport};
use ulink::{RpcClient, RpcClientBuilder, RpcServer, RpcServerBuilder, ULinkError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn method() -> UUri {
    UUri::new("vehicle", 0x0002_0001, 1, 0x10)
}

fn server_transport(bus: &Arc<LocalBus>) -> Arc<LocalTransport> {
    Arc::new(LocalTransport::new(method().with_resource(0), Arc::clone(bus)))
}

fn client_transport(bus: &Arc<LocalBus>) -> Arc<LocalTransport> {
    Arc::new(LocalTransport::new(
        UUri::new("vehicle", 0x0001_0001, 1, 0),
        Arc::clone(bus),
    ))
}

fn echo_server(bus: &Arc<LocalBus>) -> Result<RpcServer> {
    let server = RpcServer::serve(server_transport(bus), method(), |request| {
        let payload = request
            .payload
            .clone()
            .map(|data| Payload::new(data, request.attributes.payload_format));
        Ok(payload)
    })?;
    Ok(server)
}

#[tokio::test]
async fn test_echo_round_trip() -> Result<()> {
    init_tracing();
    let bus = LocalBus::new();
    let _server = echo_server(&bus)?;

    let client = RpcClient::new(
        client_transport(&bus),
        method(),
        UPriority::Cs4,
        Duration::from_secs(5),
    )?;

    let response = client.request_with_payload(Payload::text("ping"))?.await?;
    assert_eq!(response.payload.as_deref(), Some(&b"ping"[..]));
    assert_eq!(response.attributes.payload_format, UPayloadFormat::Text);
    assert_eq!(response.attributes.source, method());
    Ok(())
}

#[tokio::test]
async fn test_handler_error_becomes_commstatus() -> Result<()> {
    init_tracing();
    let bus = LocalBus::new();
    let _server = RpcServer::serve(server_transport(&bus), method(), |_| {
        Err(UStatus::new(UCode::NotFound, "no such seat"))
    })?;

    let client = RpcClient::new(
        client_transport(&bus),
        method(),
        UPriority::Cs5,
        Duration::from_secs(5),
    )?;

    let status = client.request()?.await.unwrap_err();
    assert_eq!(status.code, UCode::NotFound);
    Ok(())
}

#[tokio::test]
async fn test_response_ttl_and_format() -> Result<()> {
    init_tracing();
    let bus = LocalBus::new();
    let _server = RpcServerBuilder::new()
        .with_payload_format(UPayloadFormat::Text)
        .with_ttl(Duration::from_millis(750))
        .serve(server_transport(&bus), method(), |_| {
            Ok(Some(Payload::text("pong")))
        })?;

    let client = RpcClient::new(
        client_transport(&bus),
        method(),
        UPriority::Cs4,
        Duration::from_secs(5),
    )?;

    let response = client.request()?.await?;
    assert_eq!(response.attributes.ttl, Some(750));
    assert_eq!(response.payload.as_deref(), Some(&b"pong"[..]));
    Ok(())
}

#[tokio::test]
async fn test_timeout_without_server() -> Result<()> {
    init_tracing();
    let bus = LocalBus::new();
    let client = RpcClient::new(
        client_transport(&bus),
        method(),
        UPriority::Cs4,
        Duration::from_millis(50),
    )?;

    let start = Instant::now();
    let status = client.request()?.await.unwrap_err();

    assert_eq!(status.code, UCode::DeadlineExceeded);
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert_eq!(bus.listener_count(), 0);
    Ok(())
}

#[test]
fn test_client_drop_cancels_outstanding() -> Result<()> {
    init_tracing();
    let bus = LocalBus::new();
    let client = RpcClient::new(
        client_transport(&bus),
        method(),
        UPriority::Cs4,
        Duration::from_secs(5),
    )?;

    let future = client.request()?;
    assert_eq!(client.pending(), 1);

    let start = Instant::now();
    thread::sleep(Duration::from_millis(50));
    drop(client);

    let status = future.wait().unwrap_err();
    assert_eq!(status.code, UCode::Cancelled);
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(bus.listener_count(), 0);
    Ok(())
}

#[test]
fn test_closed_bus_fails_immediately() -> Result<()> {
    init_tracing();
    let bus = LocalBus::new();
    let client = RpcClient::new(
        client_transport(&bus),
        method(),
        UPriority::Cs4,
        Duration::from_secs(5),
    )?;
    bus.close();

    let status = client.request()?.wait().unwrap_err();
    assert_eq!(status.code, UCode::Unavailable);
    assert_eq!(client.pending(), 0);
    Ok(())
}

#[test]
fn test_server_drop_stops_answers() -> Result<()> {
    init_tracing();
    let bus = LocalBus::new();
    let server = echo_server(&bus)?;
    let client = RpcClient::new(
        client_transport(&bus),
        method(),
        UPriority::Cs4,
        Duration::from_millis(30),
    )?;

    assert!(client.request()?.wait().is_ok());

    drop(server);
    let status = client.request()?.wait().unwrap_err();
    assert_eq!(status.code, UCode::DeadlineExceeded);
    Ok(())
}

#[test]
fn test_concurrent_clients() -> Result<()> {
    init_tracing();
    let bus = LocalBus::new();
    let _server = echo_server(&bus)?;

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let transport = client_transport(&bus);
            thread::spawn(move || -> Result<()> {
                let client = RpcClientBuilder::new(method())
                    .with_transport(transport)
                    .with_ttl(Duration::from_secs(5))
                    .build()?;
                for i in 0..20 {
                    let text = format!("{}-{}", worker, i);
                    let response = client
                        .request_with_payload(Payload::text(text.clone()))?
                        .wait()?;
                    assert_eq!(response.payload.as_deref(), Some(text.as_bytes()));
                }
                Ok(())
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked")?;
    }
    Ok(())
}

#[test]
fn test_missing_transport_is_reported() {
    let result = RpcClientBuilder::new(method()).build();
    assert!(matches!(result, Err(ULinkError::MissingTransport)));
}
