//! # ulink transport
//!
//! Callback connections and the transport abstraction used by ulink clients and servers.
//!
//! A [`connection`] pairs an owning [`Handle`] with any number of [`Callable`] copies. The
//! [`UTransport`] trait hands out listener handles built on those connections, and
//! [`LocalTransport`] is an in-process implementation over a shared [`LocalBus`].

#![warn(missing_docs)]

/// Owner/caller connection pairs around a callback
pub mod connection;

/// Transport abstraction
pub mod transport;

/// In-process transport
pub mod local;

/// Transport error types
pub mod error;

pub use connection::{establish, establish_with_cleanup, Callable, ConnectionId, Handle};
pub use error::TransportError;
pub use local::{LocalBus, LocalBusConfig, LocalTransport};
pub use transport::{ListenCallback, ListenHandle, Listener, UTransport};

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
