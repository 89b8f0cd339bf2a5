//! Request/response payloads

use crate::message::UPayloadFormat;
use crate::Result;
use bytes::Bytes;
use serde::Serialize;

/// Serialized payload bytes tagged with their format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Encoded bytes
    pub data: Bytes,
    /// Encoding of `data`
    pub format: UPayloadFormat,
}

impl Payload {
    /// Create a payload from raw bytes
    pub fn new(data: impl Into<Bytes>, format: UPayloadFormat) -> Self {
        Self {
            data: data.into(),
            format,
        }
    }

    /// Create a UTF-8 text payload
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text.into(), UPayloadFormat::Text)
    }

    /// Serialize a value as a JSON payload
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let data = serde_json::to_vec(value)?;
        Ok(Self::new(data, UPayloadFormat::Json))
    }

    /// Split into bytes and format
    pub fn into_parts(self) -> (Bytes, UPayloadFormat) {
        (self.data, self.format)
    }
}
