//! Error types for ulink

use thiserror::Error;
use ulink_proto::{ProtocolError, UStatus};
use ulink_transport::TransportError;

/// Main error type for ulink operations
#[derive(Debug, Error)]
pub enum ULinkError {
    /// A client was built without a transport
    #[error("No transport was supplied")]
    MissingTransport,

    /// Message construction or validation failed
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport-related errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A status reported by a transport or a remote service
    #[error("Status: {0}")]
    Status(#[from] UStatus),

    /// The expire worker thread could not be started
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ULinkError> for UStatus {
    fn from(error: ULinkError) -> Self {
        match error {
            ULinkError::Protocol(inner) => inner.into(),
            ULinkError::Transport(inner) => inner.into(),
            ULinkError::Status(status) => status,
            other => UStatus::new(ulink_proto::UCode::Internal, other.to_string()),
        }
    }
}
