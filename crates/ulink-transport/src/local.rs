//! In-process transport
//!
//! A [`LocalBus`] routes messages between any number of [`LocalTransport`]s in the same
//! process. Delivery is synchronous: [`UTransport::send`] runs matching listeners on the
//! sending thread, after the bus lock has been released.

use crate::connection::establish_with_cleanup;
use crate::transport::{ListenCallback, ListenHandle, Listener, UTransport};
use crate::TransportError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};
use ulink_proto::{UMessage, UMessageType, UStatus, UUri};

/// Local bus configuration
#[derive(Debug, Clone)]
pub struct LocalBusConfig {
    /// Maximum number of registered listeners
    pub max_listeners: usize,
}

impl Default for LocalBusConfig {
    fn default() -> Self {
        Self {
            max_listeners: 1024,
        }
    }
}

#[derive(Debug, Clone)]
struct Filters {
    source: UUri,
    sink: Option<UUri>,
}

impl Filters {
    fn accepts(&self, message: &UMessage) -> bool {
        let attributes = &message.attributes;
        if !self.source.matches(&attributes.source) {
            return false;
        }
        match &self.sink {
            Some(filter) => attributes.sink.as_ref().is_some_and(|sink| filter.matches(sink)),
            None => true,
        }
    }
}

#[derive(Default)]
struct BusState {
    closed: bool,
    listeners: HashMap<ListenCallback, Filters>,
}

/// Shared in-process message bus
pub struct LocalBus {
    config: LocalBusConfig,
    state: Mutex<BusState>,
}

impl LocalBus {
    /// Create a bus with default configuration
    pub fn new() -> Arc<Self> {
        Self::with_config(LocalBusConfig::default())
    }

    /// Create a bus with custom configuration
    pub fn with_config(config: LocalBusConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: Mutex::new(BusState::default()),
        })
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Close the bus; later sends and registrations fail with UNAVAILABLE
    ///
    /// Existing registrations stay in place until their handles are dropped.
    pub fn close(&self) {
        self.state.lock().closed = true;
        debug!("Local bus closed");
    }

    /// Whether the bus has been closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn unregister(&self, callable: &ListenCallback) {
        if self.state.lock().listeners.remove(callable).is_some() {
            debug!("Removed listener {:?}", callable.id());
        }
    }
}

impl std::fmt::Debug for LocalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LocalBus")
            .field("config", &self.config)
            .field("closed", &state.closed)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

/// A transport endpoint on a [`LocalBus`]
#[derive(Debug, Clone)]
pub struct LocalTransport {
    entity: UUri,
    bus: Arc<LocalBus>,
}

impl LocalTransport {
    /// Attach an endpoint for `entity` to `bus`
    pub fn new(entity: UUri, bus: Arc<LocalBus>) -> Self {
        Self { entity, bus }
    }

    /// Bus this endpoint is attached to
    pub fn bus(&self) -> &Arc<LocalBus> {
        &self.bus
    }

    fn check_message(message: &UMessage) -> crate::Result<()> {
        match message.attributes.message_type {
            UMessageType::Unspecified => Err(TransportError::InvalidMessage(
                "message type is unspecified".to_string(),
            )),
            UMessageType::Request | UMessageType::Response if message.attributes.sink.is_none() => {
                Err(TransportError::InvalidMessage(
                    "RPC message has no sink".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

impl UTransport for LocalTransport {
    fn send(&self, message: UMessage) -> UStatus {
        if let Err(e) = Self::check_message(&message) {
            return e.into();
        }

        let targets: Vec<ListenCallback> = {
            let state = self.bus.state.lock();
            if state.closed {
                return TransportError::Closed.into();
            }
            state
                .listeners
                .iter()
                .filter(|(_, filters)| filters.accepts(&message))
                .map(|(callable, _)| callable.clone())
                .collect()
        };

        trace!(
            "Delivering {:?} {} to {} listener(s)",
            message.message_type(),
            message.id(),
            targets.len()
        );

        for target in targets {
            target.call(message.clone());
        }
        UStatus::ok()
    }

    fn register_listener(
        &self,
        listener: Listener,
        source_filter: &UUri,
        sink_filter: Option<&UUri>,
    ) -> Result<ListenHandle, UStatus> {
        let mut state = self.bus.state.lock();
        if state.closed {
            return Err(TransportError::Closed.into());
        }
        if state.listeners.len() >= self.bus.config.max_listeners {
            return Err(TransportError::TooManyListeners {
                limit: self.bus.config.max_listeners,
            }
            .into());
        }

        let bus: Weak<LocalBus> = Arc::downgrade(&self.bus);
        let (handle, callable) = establish_with_cleanup(listener, move |callable: &ListenCallback| {
            if let Some(bus) = bus.upgrade() {
                bus.unregister(callable);
            }
        });

        debug!(
            "Registered listener {:?} (source {:?}, sink {:?})",
            callable.id(),
            source_filter,
            sink_filter
        );
        state.listeners.insert(
            callable,
            Filters {
                source: source_filter.clone(),
                sink: sink_filter.cloned(),
            },
        );

        Ok(handle)
    }

    fn entity_uri(&self) -> &UUri {
        &self.entity
    }
}
