//! Transport abstraction

use crate::connection::{Callable, Handle};
use ulink_proto::{UMessage, UStatus, UUri};

/// Handle keeping a listener registered; dropping it unregisters the listener
pub type ListenHandle = Handle<UMessage, ()>;

/// Invoking side of a registered listener, as held by a transport
pub type ListenCallback = Callable<UMessage, ()>;

/// Listener callback accepted by [`UTransport::register_listener`]
pub type Listener = Box<dyn Fn(UMessage) + Send + Sync>;

/// Message transport used by RPC clients and servers
///
/// Implementations deliver inbound messages on their own threads, so listeners must be
/// prepared to run concurrently with the code that registered them.
pub trait UTransport: Send + Sync {
    /// Send a message; a non-OK status reports a failed delivery attempt
    fn send(&self, message: UMessage) -> UStatus;

    /// Register a listener for messages whose source matches `source_filter` and, if given,
    /// whose sink matches `sink_filter`
    ///
    /// The listener stays registered for as long as the returned handle is held.
    fn register_listener(
        &self,
        listener: Listener,
        source_filter: &UUri,
        sink_filter: Option<&UUri>,
    ) -> Result<ListenHandle, UStatus>;

    /// Address of the entity this transport sends on behalf of
    fn entity_uri(&self) -> &UUri;
}
