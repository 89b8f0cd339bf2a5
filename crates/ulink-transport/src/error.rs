//! Transport error types

use thiserror::Error;
use ulink_proto::{ProtocolError, UCode, UStatus};

/// Transport-specific errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// The bus was closed
    #[error("Transport is closed")]
    Closed,

    /// Listener limit reached
    #[error("Listener limit of {limit} reached")]
    TooManyListeners {
        /// Configured maximum
        limit: usize,
    },

    /// Message cannot be delivered as given
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl From<TransportError> for UStatus {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Protocol(inner) => inner.into(),
            other => {
                let code = match other {
                    TransportError::Closed => UCode::Unavailable,
                    TransportError::TooManyListeners { .. } => UCode::ResourceExhausted,
                    _ => UCode::InvalidArgument,
                };
                UStatus::new(code, other.to_string())
            }
        }
    }
}
