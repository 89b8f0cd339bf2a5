//! Validating message builder
//!
//! A [`UMessageBuilder`] holds a template of message attributes. Each call to
//! [`UMessageBuilder::build`] or [`UMessageBuilder::build_with_payload`] produces a new message
//! with a fresh ID, so one builder can be reused for every request a client sends.

use crate::message::{UAttributes, UCode, UMessage, UMessageType, UPayloadFormat, UPriority};
use crate::payload::Payload;
use crate::uri::UUri;
use crate::{ProtocolError, Result};
use std::time::Duration;
use uuid::Uuid;

/// Builder for publish, notification, request and response messages
#[derive(Debug, Clone)]
pub struct UMessageBuilder {
    /// Attribute template copied into every built message
    attributes: UAttributes,
    /// Payload format every payload must match, if configured
    expected_format: Option<UPayloadFormat>,
}

impl UMessageBuilder {
    fn new(
        message_type: UMessageType,
        source: UUri,
        sink: Option<UUri>,
        reqid: Option<Uuid>,
    ) -> Self {
        Self {
            attributes: UAttributes {
                message_type,
                source,
                sink,
                reqid,
                ..Default::default()
            },
            expected_format: None,
        }
    }

    /// Start a message published to `topic`
    pub fn publish(topic: UUri) -> Result<Self> {
        if !topic.is_topic() {
            return Err(ProtocolError::InvalidUri {
                role: "topic",
                reason: format!("{:?} is not a publish topic", topic),
            });
        }

        Ok(Self::new(UMessageType::Publish, topic, None, None))
    }

    /// Start a notification from `source` to the entity `sink`
    pub fn notification(source: UUri, sink: UUri) -> Result<Self> {
        if !source.is_topic() {
            return Err(ProtocolError::InvalidUri {
                role: "source",
                reason: format!("{:?} is not a notification topic", source),
            });
        }
        if !sink.is_notification_sink() {
            return Err(ProtocolError::InvalidUri {
                role: "sink",
                reason: format!("{:?} cannot receive notifications", sink),
            });
        }

        Ok(Self::new(UMessageType::Notification, source, Some(sink), None))
    }

    /// Start a request to `method`, with responses addressed back to `source`
    pub fn request(method: UUri, source: UUri, priority: UPriority, ttl: Duration) -> Result<Self> {
        if !method.is_rpc_method() {
            return Err(ProtocolError::InvalidUri {
                role: "method",
                reason: format!("{:?} is not an RPC method", method),
            });
        }
        if !source.is_rpc_response() {
            return Err(ProtocolError::InvalidUri {
                role: "source",
                reason: format!("{:?} cannot receive RPC responses", source),
            });
        }

        Self::new(UMessageType::Request, source, Some(method), None)
            .with_priority(priority)?
            .with_ttl(ttl)
    }

    /// Start a response from `method` to `sink` for the request `request_id`
    pub fn response(
        sink: UUri,
        request_id: Uuid,
        priority: UPriority,
        method: UUri,
    ) -> Result<Self> {
        if !method.is_rpc_method() {
            return Err(ProtocolError::InvalidUri {
                role: "method",
                reason: format!("{:?} is not an RPC method", method),
            });
        }
        if !sink.is_rpc_response() {
            return Err(ProtocolError::InvalidUri {
                role: "sink",
                reason: format!("{:?} cannot receive RPC responses", sink),
            });
        }
        if request_id.is_nil() {
            return Err(ProtocolError::OutOfRange("request ID is nil".to_string()));
        }

        Self::new(UMessageType::Response, method, Some(sink), Some(request_id))
            .with_priority(priority)
    }

    /// Start the response to a received request
    pub fn response_to(request: &UMessage) -> Result<Self> {
        let method = request.attributes.sink.clone().ok_or_else(|| ProtocolError::InvalidUri {
            role: "method",
            reason: "request has no sink".to_string(),
        })?;

        Self::response(
            request.attributes.source.clone(),
            request.attributes.id,
            request.attributes.priority,
            method,
        )
    }

    /// Set the priority; requests and responses need at least CS4
    pub fn with_priority(mut self, priority: UPriority) -> Result<Self> {
        let is_rpc = matches!(
            self.attributes.message_type,
            UMessageType::Request | UMessageType::Response
        );
        if is_rpc && priority < UPriority::Cs4 {
            return Err(ProtocolError::OutOfRange(format!(
                "priority {:?} is below CS4 for an RPC message",
                priority
            )));
        }

        self.attributes.priority = priority;
        Ok(self)
    }

    /// Set the time to live; must be positive and fit in 32 bits of milliseconds
    pub fn with_ttl(mut self, ttl: Duration) -> Result<Self> {
        let millis = ttl.as_millis();
        if millis == 0 || millis > u128::from(u32::MAX) {
            return Err(ProtocolError::OutOfRange(format!("TTL of {:?}", ttl)));
        }

        self.attributes.ttl = Some(millis as u32);
        Ok(self)
    }

    /// Attach an access token (requests only)
    pub fn with_token(mut self, token: impl Into<String>) -> Result<Self> {
        self.require_type(UMessageType::Request, "token")?;
        self.attributes.token = Some(token.into());
        Ok(self)
    }

    /// Set the permission level (requests only)
    pub fn with_permission_level(mut self, level: u32) -> Result<Self> {
        self.require_type(UMessageType::Request, "permission level")?;
        self.attributes.permission_level = Some(level);
        Ok(self)
    }

    /// Set the communication status (responses only); OK is not recorded
    pub fn with_comm_status(mut self, code: UCode) -> Result<Self> {
        self.require_type(UMessageType::Response, "commstatus")?;
        if code != UCode::Ok {
            self.attributes.commstatus = Some(code);
        }
        Ok(self)
    }

    /// Require every built message to carry a payload of this format
    pub fn with_payload_format(mut self, format: UPayloadFormat) -> Result<Self> {
        self.attributes.payload_format = format;
        self.expected_format = Some(format);
        Ok(self)
    }

    /// Attribute template
    pub fn attributes(&self) -> &UAttributes {
        &self.attributes
    }

    /// Build a message without a payload
    pub fn build(&self) -> Result<UMessage> {
        if let Some(format) = self.expected_format {
            return Err(ProtocolError::UnexpectedFormat(format!(
                "a {:?} payload is required",
                format
            )));
        }

        Ok(UMessage {
            attributes: self.stamped_attributes(),
            payload: None,
        })
    }

    /// Build a message carrying `payload`
    pub fn build_with_payload(&self, payload: Payload) -> Result<UMessage> {
        let (data, format) = payload.into_parts();
        if let Some(expected) = self.expected_format {
            if expected != format {
                return Err(ProtocolError::UnexpectedFormat(format!(
                    "expected {:?}, got {:?}",
                    expected, format
                )));
            }
        }

        let mut attributes = self.stamped_attributes();
        attributes.payload_format = format;

        Ok(UMessage {
            attributes,
            payload: Some(data),
        })
    }

    fn stamped_attributes(&self) -> UAttributes {
        UAttributes {
            id: Uuid::now_v7(),
            ..self.attributes.clone()
        }
    }

    fn require_type(&self, expected: UMessageType, what: &str) -> Result<()> {
        if self.attributes.message_type != expected {
            return Err(ProtocolError::Domain(format!(
                "{} can only be set on a {:?} message",
                what, expected
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
