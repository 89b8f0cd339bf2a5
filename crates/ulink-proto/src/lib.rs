//! # ulink Protocol
//!
//! Message datamodel, payloads and message builders shared by the ulink transport and
//! communication layers.

#![warn(missing_docs)]

/// Message types and status codes
pub mod message;

/// Entity and resource addressing
pub mod uri;

/// Request/response payloads
pub mod payload;

/// Validating message builder
pub mod builder;

/// Error types for protocol operations
pub mod error;

pub use builder::UMessageBuilder;
pub use error::ProtocolError;
pub use message::{UAttributes, UCode, UMessage, UMessageType, UPayloadFormat, UPriority, UStatus};
pub use payload::Payload;
pub use uri::UUri;
pub use uuid::Uuid;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
