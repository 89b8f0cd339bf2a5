//! Topic subscriber

use crate::{Result, ULinkError};
use std::sync::Arc;
use tracing::debug;
use ulink_proto::{ProtocolError, UMessage, UUri};
use ulink_transport::{ListenHandle, UTransport};

/// Subscription to a topic; dropping it stops delivery
pub struct Subscriber {
    // Unregisters before the transport reference is released
    subscription: ListenHandle,
    topic: UUri,
    transport: Arc<dyn UTransport>,
}

impl Subscriber {
    /// Deliver every message published to `topic` to `callback`
    ///
    /// `topic` is a filter and may contain wildcards, but its resource must be in the topic range.
    pub fn subscribe<F>(transport: Arc<dyn UTransport>, topic: UUri, callback: F) -> Result<Self>
    where
        F: Fn(UMessage) + Send + Sync + 'static,
    {
        if !topic.is_subscription() {
            return Err(ProtocolError::InvalidUri {
                role: "topic",
                reason: format!("{:?} is not a topic subscription pattern", topic),
            }
            .into());
        }

        let subscription = transport
            .register_listener(Box::new(callback), &topic, None)
            .map_err(ULinkError::Status)?;

        debug!("Subscribed to {:?}", topic);
        Ok(Self {
            subscription,
            topic,
            transport,
        })
    }

    /// Topic filter of this subscription
    pub fn topic(&self) -> &UUri {
        &self.topic
    }

    /// Whether messages are still being delivered
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_connected()
    }

    /// Transport the subscription is registered on
    pub fn transport(&self) -> &Arc<dyn UTransport> {
        &self.transport
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("topic", &self.topic)
            .field("subscription", &self.subscription)
            .finish()
    }
}
