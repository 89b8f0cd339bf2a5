//! RPC client
//!
//! An [`RpcClient`] is bound to one method URI. Every invocation registers a response
//! listener, sends the request and schedules a timeout, and the caller's callback receives
//! exactly one [`MessageOrStatus`]: the matching response, the status of a failed
//! registration or send, `DEADLINE_EXCEEDED`, or `CANCELLED` when the client is dropped first.

use crate::expire::{ExpireService, ExpireWorker};
use crate::{Result, ULinkError};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use ulink_proto::{
    Payload, UCode, UMessage, UMessageBuilder, UPayloadFormat, UPriority, UStatus, UUri,
};
use ulink_transport::{establish, Callable, Handle, Listener, UTransport};

/// Outcome of an invocation
pub type MessageOrStatus = std::result::Result<UMessage, UStatus>;

/// Handle keeping an invocation's callback connected
///
/// Dropping it disconnects the callback; the request itself still runs to completion.
pub type InvokeHandle = Handle<MessageOrStatus, ()>;

const COMMSTATUS_MESSAGE: &str = "Received response with !OK commstatus";

/// RPC client configuration
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    /// Request priority
    pub priority: UPriority,
    /// Request time to live
    pub ttl: Duration,
    /// Payload format every request must carry
    pub payload_format: Option<UPayloadFormat>,
    /// Permission level sent with every request
    pub permission_level: Option<u32>,
    /// Access token sent with every request
    pub token: Option<String>,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            priority: UPriority::Cs4,
            ttl: Duration::from_secs(10),
            payload_format: None,
            permission_level: None,
            token: None,
        }
    }
}

/// Builder for [`RpcClient`]
pub struct RpcClientBuilder {
    method: UUri,
    transport: Option<Arc<dyn UTransport>>,
    config: RpcClientConfig,
    expire_worker: Option<Arc<ExpireWorker>>,
}

impl RpcClientBuilder {
    /// Start building a client for `method`
    pub fn new(method: UUri) -> Self {
        Self {
            method,
            transport: None,
            config: RpcClientConfig::default(),
            expire_worker: None,
        }
    }

    /// Set the transport requests are sent over
    pub fn with_transport(mut self, transport: Arc<dyn UTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: RpcClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the request priority
    pub fn with_priority(mut self, priority: UPriority) -> Self {
        self.config.priority = priority;
        self
    }

    /// Set the request time to live
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Require every request payload to have this format
    pub fn with_payload_format(mut self, format: UPayloadFormat) -> Self {
        self.config.payload_format = Some(format);
        self
    }

    /// Send this permission level with every request
    pub fn with_permission_level(mut self, level: u32) -> Self {
        self.config.permission_level = Some(level);
        self
    }

    /// Send this access token with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    /// Schedule timeouts on a dedicated worker instead of the process-wide one
    pub fn with_expire_worker(mut self, worker: Arc<ExpireWorker>) -> Self {
        self.expire_worker = Some(worker);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<RpcClient> {
        let transport = self.transport.ok_or(ULinkError::MissingTransport)?;
        let config = self.config;

        let mut builder = UMessageBuilder::request(
            self.method.clone(),
            transport.entity_uri().clone(),
            config.priority,
            config.ttl,
        )?;
        if let Some(format) = config.payload_format {
            builder = builder.with_payload_format(format)?;
        }
        if let Some(level) = config.permission_level {
            builder = builder.with_permission_level(level)?;
        }
        if let Some(token) = config.token {
            builder = builder.with_token(token)?;
        }

        let expire_service = match self.expire_worker {
            Some(worker) => ExpireService::with_worker(worker),
            None => ExpireService::new()?,
        };

        debug!("Created RPC client for {:?}", self.method);
        Ok(RpcClient {
            transport,
            method: self.method,
            ttl: config.ttl,
            builder,
            expire_service,
        })
    }
}

/// Hands the outcome to the caller's callable at most once
struct Completion {
    target: Mutex<Option<Callable<MessageOrStatus, ()>>>,
}

impl Completion {
    fn complete(&self, outcome: MessageOrStatus) {
        let target = self.target.lock().take();
        if let Some(callable) = target {
            callable.call(outcome);
        }
    }
}

/// Client for one RPC method
pub struct RpcClient {
    transport: Arc<dyn UTransport>,
    method: UUri,
    ttl: Duration,
    builder: UMessageBuilder,
    expire_service: ExpireService,
}

impl RpcClient {
    /// Create a client with default options, see [`RpcClientBuilder`] for the rest
    pub fn new(
        transport: Arc<dyn UTransport>,
        method: UUri,
        priority: UPriority,
        ttl: Duration,
    ) -> Result<Self> {
        RpcClientBuilder::new(method)
            .with_transport(transport)
            .with_priority(priority)
            .with_ttl(ttl)
            .build()
    }

    /// Method this client invokes
    pub fn method(&self) -> &UUri {
        &self.method
    }

    /// Time to live applied to every request
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of this client's requests waiting on their deadline
    pub fn pending(&self) -> usize {
        self.expire_service.pending()
    }

    /// Send a prepared request and deliver its outcome to `callback`
    pub fn invoke_method<F>(&self, request: UMessage, callback: F) -> InvokeHandle
    where
        F: FnOnce(MessageOrStatus) + Send + 'static,
    {
        let when_expire = Instant::now() + self.ttl;
        let request_id = request.id();

        let callback = Mutex::new(Some(callback));
        let (handle, callable) = establish(move |outcome: MessageOrStatus| {
            let callback = callback.lock().take();
            if let Some(callback) = callback {
                callback(outcome);
            }
        });

        let completion = Arc::new(Completion {
            target: Mutex::new(Some(callable)),
        });

        let on_response = Arc::clone(&completion);
        let listener: Listener = Box::new(move |response: UMessage| {
            if response.request_id() != Some(request_id) {
                return;
            }
            match response.attributes.commstatus {
                Some(code) if code != UCode::Ok => {
                    on_response.complete(Err(UStatus::new(code, COMMSTATUS_MESSAGE)));
                }
                _ => on_response.complete(Ok(response)),
            }
        });
        let expire = move |status: UStatus| completion.complete(Err(status));

        let Some(method) = request.attributes.sink.clone() else {
            expire(UStatus::new(UCode::InvalidArgument, "Request has no method sink"));
            return handle;
        };

        debug!("Invoking {:?} (request {})", method, request_id);
        match self
            .transport
            .register_listener(listener, &method, Some(&request.attributes.source))
        {
            Err(status) => {
                warn!("Failed to register response listener for {}: {}", request_id, status);
                expire(status);
            }
            Ok(listen_handle) => {
                let status = self.transport.send(request);
                if status.is_ok() {
                    self.expire_service.enqueue(when_expire, listen_handle, expire);
                } else {
                    warn!("Failed to send request {}: {}", request_id, status);
                    drop(listen_handle);
                    expire(status);
                }
            }
        }

        handle
    }

    /// Send a request carrying `payload`
    pub fn invoke_with_payload<F>(&self, payload: Payload, callback: F) -> Result<InvokeHandle>
    where
        F: FnOnce(MessageOrStatus) + Send + 'static,
    {
        let request = self.builder.build_with_payload(payload)?;
        Ok(self.invoke_method(request, callback))
    }

    /// Send a request without a payload
    pub fn invoke<F>(&self, callback: F) -> Result<InvokeHandle>
    where
        F: FnOnce(MessageOrStatus) + Send + 'static,
    {
        let request = self.builder.build()?;
        Ok(self.invoke_method(request, callback))
    }

    /// Send a prepared request, returning a future for its outcome
    pub fn request_method(&self, request: UMessage) -> InvokeFuture {
        let (sender, receiver) = oneshot::channel();
        let handle = self.invoke_method(request, move |outcome| {
            let _ = sender.send(outcome);
        });
        InvokeFuture { receiver, handle }
    }

    /// Send a request carrying `payload`, returning a future for its outcome
    pub fn request_with_payload(&self, payload: Payload) -> Result<InvokeFuture> {
        let request = self.builder.build_with_payload(payload)?;
        Ok(self.request_method(request))
    }

    /// Send a request without a payload, returning a future for its outcome
    pub fn request(&self) -> Result<InvokeFuture> {
        let request = self.builder.build()?;
        Ok(self.request_method(request))
    }
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("method", &self.method)
            .field("ttl", &self.ttl)
            .field("expire_service", &self.expire_service)
            .finish()
    }
}

/// Outcome of an invocation that has not been delivered yet
///
/// Await it from async code, or call [`InvokeFuture::wait`] from a plain thread.
#[must_use = "dropping an InvokeFuture discards the invocation's outcome"]
#[derive(Debug)]
pub struct InvokeFuture {
    receiver: oneshot::Receiver<MessageOrStatus>,
    handle: InvokeHandle,
}

impl InvokeFuture {
    /// Handle connecting this future to its invocation
    pub fn handle(&self) -> &InvokeHandle {
        &self.handle
    }

    /// Block the current thread until the outcome arrives
    ///
    /// Panics if called from within an async runtime, like
    /// [`tokio::sync::oneshot::Receiver::blocking_recv`].
    pub fn wait(self) -> MessageOrStatus {
        let Self { receiver, handle } = self;
        let outcome = receiver.blocking_recv().unwrap_or_else(|_| Err(abandoned()));
        drop(handle);
        outcome
    }

    /// Take the outcome if it has already arrived
    pub fn try_result(&mut self) -> Option<MessageOrStatus> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(abandoned())),
        }
    }
}

impl Future for InvokeFuture {
    type Output = MessageOrStatus;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(abandoned())))
    }
}

fn abandoned() -> UStatus {
    UStatus::new(UCode::Internal, "Invocation ended without an outcome")
}
