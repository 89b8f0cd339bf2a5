//! RPC server
//!
//! An [`RpcServer`] answers requests for one method URI. The handler runs on the transport's
//! delivery thread and returns the response payload, or a status that is sent back as the
//! response's commstatus.

use crate::{Result, ULinkError};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, trace, warn};
use ulink_proto::{
    Payload, ProtocolError, UMessage, UMessageBuilder, UMessageType, UPayloadFormat, UStatus, UUri,
};
use ulink_transport::{ListenHandle, UTransport};

/// Outcome of handling one request
pub type HandlerResult = std::result::Result<Option<Payload>, UStatus>;

/// Response options applied to every reply
#[derive(Debug, Clone, Default)]
struct ResponseOptions {
    payload_format: Option<UPayloadFormat>,
    ttl: Option<Duration>,
}

impl ResponseOptions {
    fn build(&self, request: &UMessage, outcome: HandlerResult) -> ulink_proto::Result<UMessage> {
        let mut builder = UMessageBuilder::response_to(request)?;
        if let Some(ttl) = self.ttl {
            builder = builder.with_ttl(ttl)?;
        }

        match outcome {
            Ok(Some(payload)) => {
                if let Some(format) = self.payload_format {
                    builder = builder.with_payload_format(format)?;
                }
                builder.build_with_payload(payload)
            }
            Ok(None) => builder.build(),
            Err(status) => builder.with_comm_status(status.code)?.build(),
        }
    }
}

/// Builder for [`RpcServer`]
#[derive(Debug, Clone, Default)]
pub struct RpcServerBuilder {
    options: ResponseOptions,
}

impl RpcServerBuilder {
    /// Create a builder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Require response payloads to have this format
    pub fn with_payload_format(mut self, format: UPayloadFormat) -> Self {
        self.options.payload_format = Some(format);
        self
    }

    /// Set the time to live of responses
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.options.ttl = Some(ttl);
        self
    }

    /// Register `handler` for requests to `method`
    pub fn serve<H>(
        self,
        transport: Arc<dyn UTransport>,
        method: UUri,
        handler: H,
    ) -> Result<RpcServer>
    where
        H: Fn(&UMessage) -> HandlerResult + Send + Sync + 'static,
    {
        if !method.is_rpc_method() {
            return Err(ProtocolError::InvalidUri {
                role: "method",
                reason: format!("{:?} is not an RPC method", method),
            }
            .into());
        }

        let options = self.options;
        let sender: Weak<dyn UTransport> = Arc::downgrade(&transport);
        let listener = Box::new(move |request: UMessage| {
            if request.message_type() != UMessageType::Request {
                trace!("Ignoring {:?} message {}", request.message_type(), request.id());
                return;
            }
            let Some(transport) = sender.upgrade() else {
                return;
            };

            trace!("Handling request {}", request.id());
            let outcome = handler(&request);
            match options.build(&request, outcome) {
                Ok(response) => {
                    let status = transport.send(response);
                    if !status.is_ok() {
                        warn!("Failed to send response to {}: {}", request.id(), status);
                    }
                }
                Err(e) => error!("Failed to build response to {}: {}", request.id(), e),
            }
        });

        let listener = transport
            .register_listener(listener, &UUri::any(), Some(&method))
            .map_err(ULinkError::Status)?;

        debug!("Serving {:?}", method);
        Ok(RpcServer {
            listener,
            method,
            transport,
        })
    }
}

/// Server for one RPC method; dropping it stops serving
pub struct RpcServer {
    // Unregisters before the transport reference is released
    listener: ListenHandle,
    method: UUri,
    transport: Arc<dyn UTransport>,
}

impl RpcServer {
    /// Register `handler` for requests to `method` with default options
    pub fn serve<H>(transport: Arc<dyn UTransport>, method: UUri, handler: H) -> Result<Self>
    where
        H: Fn(&UMessage) -> HandlerResult + Send + Sync + 'static,
    {
        RpcServerBuilder::new().serve(transport, method, handler)
    }

    /// Method this server answers
    pub fn method(&self) -> &UUri {
        &self.method
    }

    /// Whether the listener is still registered
    pub fn is_serving(&self) -> bool {
        self.listener.is_connected()
    }

    /// Transport responses are sent over
    pub fn transport(&self) -> &Arc<dyn UTransport> {
        &self.transport
    }
}

impl std::fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcServer")
            .field("method", &self.method)
            .field("listener", &self.listener)
            .finish()
    }
}
