//! Message types and enums

use crate::uri::UUri;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Status codes shared by transports and the communication layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UCode {
    /// Success
    Ok = 0,
    /// Operation was cancelled, typically by the caller
    Cancelled = 1,
    /// Unknown error
    Unknown = 2,
    /// Client specified an invalid argument
    InvalidArgument = 3,
    /// Deadline expired before the operation could complete
    DeadlineExceeded = 4,
    /// Requested entity was not found
    NotFound = 5,
    /// Entity already exists
    AlreadyExists = 6,
    /// Caller lacks permission
    PermissionDenied = 7,
    /// Some resource has been exhausted
    ResourceExhausted = 8,
    /// System is not in a state required for the operation
    FailedPrecondition = 9,
    /// Operation was aborted
    Aborted = 10,
    /// Operation was attempted past the valid range
    OutOfRange = 11,
    /// Operation is not implemented
    Unimplemented = 12,
    /// Internal error
    Internal = 13,
    /// Service is currently unavailable
    Unavailable = 14,
    /// Unrecoverable data loss or corruption
    DataLoss = 15,
    /// Request lacks valid authentication credentials
    Unauthenticated = 16,
}

impl fmt::Display for UCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UCode::Ok => "OK",
            UCode::Cancelled => "CANCELLED",
            UCode::Unknown => "UNKNOWN",
            UCode::InvalidArgument => "INVALID_ARGUMENT",
            UCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            UCode::NotFound => "NOT_FOUND",
            UCode::AlreadyExists => "ALREADY_EXISTS",
            UCode::PermissionDenied => "PERMISSION_DENIED",
            UCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            UCode::FailedPrecondition => "FAILED_PRECONDITION",
            UCode::Aborted => "ABORTED",
            UCode::OutOfRange => "OUT_OF_RANGE",
            UCode::Unimplemented => "UNIMPLEMENTED",
            UCode::Internal => "INTERNAL",
            UCode::Unavailable => "UNAVAILABLE",
            UCode::DataLoss => "DATA_LOSS",
            UCode::Unauthenticated => "UNAUTHENTICATED",
        };
        write!(f, "{}", s)
    }
}

/// A status code with an optional human-readable explanation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UStatus {
    /// Status code
    pub code: UCode,
    /// Optional detail message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UStatus {
    /// Create a status with a code and message
    pub fn new(code: UCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    /// Create a status carrying only a code
    pub fn from_code(code: UCode) -> Self {
        Self { code, message: None }
    }

    /// The OK status
    pub fn ok() -> Self {
        Self::from_code(UCode::Ok)
    }

    /// Whether the status code is OK
    pub fn is_ok(&self) -> bool {
        self.code == UCode::Ok
    }
}

impl fmt::Display for UStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.code, message),
            None => write!(f, "{}", self.code),
        }
    }
}

impl std::error::Error for UStatus {}

impl Default for UStatus {
    fn default() -> Self {
        Self::ok()
    }
}

impl From<UCode> for UStatus {
    fn from(code: UCode) -> Self {
        Self::from_code(code)
    }
}

/// Message priority classes, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum UPriority {
    /// No priority assigned
    #[default]
    Unspecified = 0,
    /// Low priority, no bandwidth assurance
    Cs0 = 1,
    /// Standard, undifferentiated application
    Cs1 = 2,
    /// Operations, administration and management
    Cs2 = 3,
    /// Multimedia streaming
    Cs3 = 4,
    /// Real-time interactive; the minimum for requests and responses
    Cs4 = 5,
    /// Signalling
    Cs5 = 6,
    /// Network control
    Cs6 = 7,
}

/// Encoding of a message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UPayloadFormat {
    /// Format not declared
    #[default]
    Unspecified,
    /// Protobuf message wrapped in `google.protobuf.Any`
    ProtobufWrappedInAny,
    /// Raw protobuf message
    Protobuf,
    /// JSON document
    Json,
    /// SOME/IP encoded
    SomeIp,
    /// SOME/IP TLV encoded
    SomeIpTlv,
    /// Opaque bytes
    Raw,
    /// UTF-8 text
    Text,
    /// Shared memory reference
    Shm,
}

/// Kind of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UMessageType {
    /// Not set
    #[default]
    Unspecified,
    /// Published to a topic
    Publish,
    /// RPC request
    Request,
    /// RPC response
    Response,
    /// Point-to-point notification
    Notification,
}

/// Message metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UAttributes {
    /// Unique message ID
    pub id: Uuid,
    /// Message kind
    pub message_type: UMessageType,
    /// Originating entity or resource
    pub source: UUri,
    /// Destination, when the message is addressed
    pub sink: Option<UUri>,
    /// Priority class
    pub priority: UPriority,
    /// Time to live in milliseconds
    pub ttl: Option<u32>,
    /// Permission level of the requesting entity
    pub permission_level: Option<u32>,
    /// Communication status reported for a response
    pub commstatus: Option<UCode>,
    /// ID of the request a response correlates to
    pub reqid: Option<Uuid>,
    /// Access token for restricted services
    pub token: Option<String>,
    /// Payload encoding
    pub payload_format: UPayloadFormat,
}

impl Default for UAttributes {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            message_type: UMessageType::Unspecified,
            source: UUri::default(),
            sink: None,
            priority: UPriority::Unspecified,
            ttl: None,
            permission_level: None,
            commstatus: None,
            reqid: None,
            token: None,
            payload_format: UPayloadFormat::Unspecified,
        }
    }
}

/// A message: attributes plus an optional payload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UMessage {
    /// Message metadata
    pub attributes: UAttributes,
    /// Payload bytes
    pub payload: Option<Bytes>,
}

impl UMessage {
    /// Get the message ID
    pub fn id(&self) -> Uuid {
        self.attributes.id
    }

    /// Get the correlated request ID, if this is a response
    pub fn request_id(&self) -> Option<Uuid> {
        self.attributes.reqid
    }

    /// Get the message type
    pub fn message_type(&self) -> UMessageType {
        self.attributes.message_type
    }
}
