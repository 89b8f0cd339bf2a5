//! Error types for protocol operations

use crate::message::{UCode, UStatus};
use thiserror::Error;

/// Protocol-specific errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A URI failed validation for the role it was given
    #[error("Invalid {role} URI: {reason}")]
    InvalidUri {
        /// Role the URI was meant to play (method, source, sink)
        role: &'static str,
        /// Why validation failed
        reason: String,
    },

    /// A numeric value is outside its permitted range
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// A builder setting does not apply to this message type
    #[error("Not applicable to this message type: {0}")]
    Domain(String),

    /// Payload format differs from the one the builder expects
    #[error("Unexpected payload format: {0}")]
    UnexpectedFormat(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {}", err))
    }
}

impl From<ProtocolError> for UStatus {
    fn from(error: ProtocolError) -> Self {
        let code = match error {
            ProtocolError::InvalidUri { .. } => UCode::InvalidArgument,
            ProtocolError::OutOfRange(_) => UCode::OutOfRange,
            ProtocolError::Domain(_) => UCode::FailedPrecondition,
            ProtocolError::UnexpectedFormat(_) => UCode::InvalidArgument,
            ProtocolError::Serialization(_) => UCode::InvalidArgument,
        };
        UStatus::new(code, error.to_string())
    }
}
