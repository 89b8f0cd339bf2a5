//! Topic publisher
//!
//! A [`Publisher`] sends messages to one topic URI. Any number of subscribers may be
//! listening; publishing succeeds whether or not anyone receives the message.

use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};
use ulink_proto::{Payload, UMessageBuilder, UPayloadFormat, UPriority, UStatus, UUri};
use ulink_transport::UTransport;

/// Builder for [`Publisher`]
#[derive(Debug, Clone)]
pub struct PublisherBuilder {
    priority: UPriority,
    ttl: Option<Duration>,
}

impl Default for PublisherBuilder {
    fn default() -> Self {
        Self {
            priority: UPriority::Cs1,
            ttl: None,
        }
    }
}

impl PublisherBuilder {
    /// Create a builder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the priority of published messages
    pub fn with_priority(mut self, priority: UPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the time to live of published messages
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Create a publisher for `topic` whose payloads all have `format`
    pub fn build(
        self,
        transport: Arc<dyn UTransport>,
        topic: UUri,
        format: UPayloadFormat,
    ) -> Result<Publisher> {
        let mut builder = UMessageBuilder::publish(topic.clone())?
            .with_payload_format(format)?
            .with_priority(self.priority)?;
        if let Some(ttl) = self.ttl {
            builder = builder.with_ttl(ttl)?;
        }

        debug!("Publishing to {:?}", topic);
        Ok(Publisher {
            transport,
            topic,
            builder,
        })
    }
}

/// Publisher for one topic
pub struct Publisher {
    transport: Arc<dyn UTransport>,
    topic: UUri,
    builder: UMessageBuilder,
}

impl Publisher {
    /// Create a publisher for `topic` with default options
    pub fn new(
        transport: Arc<dyn UTransport>,
        topic: UUri,
        format: UPayloadFormat,
    ) -> Result<Self> {
        PublisherBuilder::new().build(transport, topic, format)
    }

    /// Topic this publisher sends to
    pub fn topic(&self) -> &UUri {
        &self.topic
    }

    /// Publish `payload`, returning the transport's status
    ///
    /// A payload of the wrong format is not sent and yields `INVALID_ARGUMENT`.
    pub fn publish(&self, payload: Payload) -> UStatus {
        let message = match self.builder.build_with_payload(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("Rejected payload for {:?}: {}", self.topic, e);
                return e.into();
            }
        };

        trace!("Publishing {} to {:?}", message.id(), self.topic);
        self.transport.send(message)
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("topic", &self.topic)
            .field("attributes", self.builder.attributes())
            .finish()
    }
}
