//! # ulink
//!
//! RPC client middleware for uProtocol-style messaging.
//!
//! An [`RpcClient`] sends requests to one fixed method over a [`UTransport`] and delivers
//! exactly one outcome per request: the matching response, a transport failure, a timeout,
//! or a cancellation when the client is dropped. Timeouts are driven by an [`ExpireWorker`]
//! thread shared by every client in the process.
//!
//! The same transport also carries published messages ([`Publisher`], [`Subscriber`]) and
//! point-to-point notifications ([`NotificationSource`], [`NotificationSink`]).
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use ulink::proto::{Payload, UPriority, UUri};
//! use ulink::transport::{LocalBus, LocalTransport};
//! use ulink::RpcClient;
//!
//! # fn main() -> ulink::Result<()> {
//! let bus = LocalBus::new();
//! let transport = Arc::new(LocalTransport::new(UUri::new("vehicle", 0x0001_0001, 1, 0), bus));
//! let method = UUri::new("vehicle", 0x0002_0001, 1, 1);
//!
//! let client = RpcClient::new(transport, method, UPriority::Cs4, Duration::from_secs(1))?;
//! let _handle = client.invoke_with_payload(Payload::text("ping"), |outcome| match outcome {
//!     Ok(response) => println!("response {}", response.id()),
//!     Err(status) => println!("failed: {}", status),
//! })?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use ulink_proto as proto;
pub use ulink_transport as transport;

/// Error types for ulink
pub mod error;

/// Request timeout scheduling
pub mod expire;

/// RPC client
pub mod client;

/// RPC server
pub mod server;

/// Topic publisher
pub mod publisher;

/// Topic subscriber
pub mod subscriber;

/// Notification source and sink
pub mod notification;

pub use client::{
    InvokeFuture, InvokeHandle, MessageOrStatus, RpcClient, RpcClientBuilder, RpcClientConfig,
};
pub use error::ULinkError;
pub use expire::{ExpireService, ExpireWorker};
pub use notification::{NotificationSink, NotificationSource, NotificationSourceBuilder};
pub use publisher::{Publisher, PublisherBuilder};
pub use server::{HandlerResult, RpcServer, RpcServerBuilder};
pub use subscriber::Subscriber;
pub use ulink_transport::UTransport;

/// Result type alias for ulink operations
pub type Result<T> = std::result::Result<T, ULinkError>;
