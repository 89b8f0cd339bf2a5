//! Point-to-point notifications
//!
//! A [`NotificationSource`] sends messages from one of its entity's topics to a single
//! entity. A [`NotificationSink`] receives the notifications addressed to its transport's
//! entity from the sources matching its filter.

use crate::{Result, ULinkError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};
use ulink_proto::{
    Payload, ProtocolError, UMessage, UMessageBuilder, UPayloadFormat, UPriority, UStatus, UUri,
};
use ulink_transport::{ListenHandle, UTransport};

/// Builder for [`NotificationSource`]
#[derive(Debug, Clone)]
pub struct NotificationSourceBuilder {
    payload_format: Option<UPayloadFormat>,
    priority: UPriority,
    ttl: Option<Duration>,
}

impl Default for NotificationSourceBuilder {
    fn default() -> Self {
        Self {
            payload_format: None,
            priority: UPriority::Cs1,
            ttl: None,
        }
    }
}

impl NotificationSourceBuilder {
    /// Create a builder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Require every notification payload to have this format
    pub fn with_payload_format(mut self, format: UPayloadFormat) -> Self {
        self.payload_format = Some(format);
        self
    }

    /// Set the priority of notifications
    pub fn with_priority(mut self, priority: UPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the time to live of notifications
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Create a source sending from `source` to `sink`
    pub fn build(
        self,
        transport: Arc<dyn UTransport>,
        source: UUri,
        sink: UUri,
    ) -> Result<NotificationSource> {
        let mut builder = UMessageBuilder::notification(source.clone(), sink.clone())?
            .with_priority(self.priority)?;
        if let Some(format) = self.payload_format {
            builder = builder.with_payload_format(format)?;
        }
        if let Some(ttl) = self.ttl {
            builder = builder.with_ttl(ttl)?;
        }

        debug!("Notifying {:?} from {:?}", sink, source);
        Ok(NotificationSource { transport, builder })
    }
}

/// Sender of notifications from one topic to one entity
pub struct NotificationSource {
    transport: Arc<dyn UTransport>,
    builder: UMessageBuilder,
}

impl NotificationSource {
    /// Create a source with default options
    pub fn new(transport: Arc<dyn UTransport>, source: UUri, sink: UUri) -> Result<Self> {
        NotificationSourceBuilder::new().build(transport, source, sink)
    }

    /// Send a notification without a payload
    ///
    /// Fails with `INVALID_ARGUMENT` when a payload format was configured.
    pub fn notify(&self) -> UStatus {
        self.send(self.builder.build())
    }

    /// Send a notification carrying `payload`
    pub fn notify_with_payload(&self, payload: Payload) -> UStatus {
        self.send(self.builder.build_with_payload(payload))
    }

    fn send(&self, message: ulink_proto::Result<UMessage>) -> UStatus {
        match message {
            Ok(message) => {
                trace!("Sending notification {}", message.id());
                self.transport.send(message)
            }
            Err(e) => {
                warn!("Failed to build notification: {}", e);
                e.into()
            }
        }
    }
}

impl std::fmt::Debug for NotificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSource")
            .field("attributes", self.builder.attributes())
            .finish()
    }
}

/// Receiver of notifications for the transport's entity; dropping it stops delivery
pub struct NotificationSink {
    // Unregisters before the transport reference is released
    listener: ListenHandle,
    source_filter: UUri,
    transport: Arc<dyn UTransport>,
}

impl NotificationSink {
    /// Deliver notifications from sources matching `source_filter` to `callback`
    pub fn create<F>(
        transport: Arc<dyn UTransport>,
        source_filter: UUri,
        callback: F,
    ) -> Result<Self>
    where
        F: Fn(UMessage) + Send + Sync + 'static,
    {
        if !source_filter.is_subscription() {
            return Err(ProtocolError::InvalidUri {
                role: "source",
                reason: format!("{:?} is not a notification source filter", source_filter),
            }
            .into());
        }

        let sink = transport.entity_uri().clone();
        let listener = transport
            .register_listener(Box::new(callback), &source_filter, Some(&sink))
            .map_err(ULinkError::Status)?;

        debug!("Receiving notifications from {:?} at {:?}", source_filter, sink);
        Ok(Self {
            listener,
            source_filter,
            transport,
        })
    }

    /// Like [`NotificationSink::create`], checking that `sink` is the transport's entity
    pub fn create_for<F>(
        transport: Arc<dyn UTransport>,
        sink: &UUri,
        source_filter: UUri,
        callback: F,
    ) -> Result<Self>
    where
        F: Fn(UMessage) + Send + Sync + 'static,
    {
        if sink != transport.entity_uri() {
            return Err(ProtocolError::InvalidUri {
                role: "sink",
                reason: format!("{:?} is not this transport's entity", sink),
            }
            .into());
        }
        Self::create(transport, source_filter, callback)
    }

    /// Source filter of this sink
    pub fn source_filter(&self) -> &UUri {
        &self.source_filter
    }

    /// Whether notifications are still being delivered
    pub fn is_listening(&self) -> bool {
        self.listener.is_connected()
    }

    /// Transport the sink is registered on
    pub fn transport(&self) -> &Arc<dyn UTransport> {
        &self.transport
    }
}

impl std::fmt::Debug for NotificationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSink")
            .field("source_filter", &self.source_filter)
            .field("listener", &self.listener)
            .finish()
    }
}
