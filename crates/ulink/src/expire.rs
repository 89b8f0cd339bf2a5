//! Request timeout scheduling
//!
//! An [`ExpireWorker`] owns a background thread and a min-heap of pending requests ordered by
//! deadline. When a deadline passes, the worker drops the request's response listener and then
//! calls its expire callback with `DEADLINE_EXCEEDED`. The lock guarding the heap is never held
//! while callbacks run.
//!
//! Clients do not talk to the worker directly. Each client owns an [`ExpireService`], which tags
//! its entries with an owner ID and cancels whatever is left when it is dropped.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{self, AtomicU64};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, trace, warn};
use ulink_proto::{UCode, UStatus};
use ulink_transport::ListenHandle;

/// Callback invoked once with the status that ended a pending request
pub type ExpireCallback = Box<dyn FnOnce(UStatus) + Send>;

const EXPIRED_MESSAGE: &str = "Request expired before response received";
const CANCELLED_MESSAGE: &str = "RpcClient for this request was discarded";
const LEAKED_MESSAGE: &str = "ExpireWorker has shut down while requests are still pending. \
     This usually means an RpcClient instance has been leaked";

/// Heap capacity below which scrubbing never shrinks the heap
const MIN_SHRINK_CAPACITY: usize = 16;

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of the client that enqueued a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Allocate a new, process-unique owner ID
    pub fn next() -> Self {
        Self(NEXT_OWNER_ID.fetch_add(1, atomic::Ordering::Relaxed))
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner-{}", self.0)
    }
}

struct PendingRequest {
    when_expire: Instant,
    listener: ListenHandle,
    expire: ExpireCallback,
    owner: OwnerId,
}

impl PendingRequest {
    /// Unregister the listener, then report `status`
    fn fire(self, status: UStatus) {
        let Self {
            listener, expire, ..
        } = self;
        drop(listener);

        if panic::catch_unwind(AssertUnwindSafe(move || expire(status))).is_err() {
            error!("Expire callback panicked");
        }
    }
}

// Reversed so that BinaryHeap pops the earliest deadline first
impl Ord for PendingRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        other.when_expire.cmp(&self.when_expire)
    }
}

impl PartialOrd for PendingRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PendingRequest {
    fn eq(&self, other: &Self) -> bool {
        self.when_expire == other.when_expire
    }
}

impl Eq for PendingRequest {}

#[derive(Default)]
struct WorkerState {
    pending: BinaryHeap<PendingRequest>,
    stopping: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<WorkerState>,
    wake: Condvar,
}

/// Background thread expiring pending requests at their deadlines
pub struct ExpireWorker {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl ExpireWorker {
    /// Start a dedicated worker thread
    pub fn spawn() -> std::io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("ulink-expire".to_string())
            .spawn(move || run(worker_shared))?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// The process-wide worker, started on first use and never shut down
    ///
    /// The worker lives in a static, so its drop never runs and entries leaked on it are not
    /// drained with `INTERNAL`. Use [`ExpireWorker::spawn`] where that notice matters.
    pub fn global() -> crate::Result<Arc<Self>> {
        static GLOBAL: OnceLock<Arc<ExpireWorker>> = OnceLock::new();

        if let Some(worker) = GLOBAL.get() {
            return Ok(Arc::clone(worker));
        }

        // A worker spawned by a losing racer is dropped and shuts down cleanly
        let worker = Arc::new(Self::spawn()?);
        Ok(Arc::clone(GLOBAL.get_or_init(move || worker)))
    }

    /// Schedule `expire` to run with `DEADLINE_EXCEEDED` at `when_expire`
    ///
    /// `listener` is dropped right before `expire` runs, whichever way the entry ends.
    pub fn enqueue<F>(
        &self,
        when_expire: Instant,
        listener: ListenHandle,
        expire: F,
        owner: OwnerId,
    ) where
        F: FnOnce(UStatus) + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        state.pending.push(PendingRequest {
            when_expire,
            listener,
            expire: Box::new(expire),
            owner,
        });
        trace!("Enqueued request for {} ({} pending)", owner, state.pending.len());
        drop(state);

        self.shared.wake.notify_one();
    }

    /// Remove every entry enqueued by `owner` and expire them with `CANCELLED`
    pub fn scrub(&self, owner: OwnerId) {
        let scrubbed = {
            let mut state = self.shared.state.lock();
            let mut entries = mem::take(&mut state.pending).into_vec();
            let mut scrubbed = Vec::new();
            let mut i = 0;
            while i < entries.len() {
                if entries[i].owner == owner {
                    scrubbed.push(entries.swap_remove(i));
                } else {
                    i += 1;
                }
            }

            state.pending = BinaryHeap::from(entries);
            let capacity = state.pending.capacity();
            if capacity > MIN_SHRINK_CAPACITY && state.pending.len() < capacity / 2 {
                state.pending.shrink_to_fit();
            }
            scrubbed
        };

        if scrubbed.is_empty() {
            return;
        }
        // The earliest deadline may have been removed
        self.shared.wake.notify_one();
        debug!("Cancelling {} pending request(s) for {}", scrubbed.len(), owner);
        for entry in scrubbed {
            entry.fire(UStatus::new(UCode::Cancelled, CANCELLED_MESSAGE));
        }
    }

    /// Number of pending entries
    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Number of pending entries enqueued by `owner`
    pub fn pending_for(&self, owner: OwnerId) -> usize {
        self.shared
            .state
            .lock()
            .pending
            .iter()
            .filter(|entry| entry.owner == owner)
            .count()
    }
}

impl Drop for ExpireWorker {
    fn drop(&mut self) {
        self.shared.state.lock().stopping = true;
        self.shared.wake.notify_all();

        if let Some(thread) = self.thread.take() {
            // Dropped from one of our own callbacks: the loop exits once that callback returns
            if thread.thread().id() != thread::current().id() && thread.join().is_err() {
                error!("Expire worker thread panicked");
            }
        }

        let leaked = mem::take(&mut self.shared.state.lock().pending).into_vec();
        if leaked.is_empty() {
            return;
        }
        warn!("Expire worker shut down with {} pending request(s)", leaked.len());
        for entry in leaked {
            entry.fire(UStatus::new(UCode::Internal, LEAKED_MESSAGE));
        }
    }
}

impl fmt::Debug for ExpireWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpireWorker")
            .field("pending", &self.pending())
            .finish()
    }
}

fn run(shared: Arc<Shared>) {
    debug!("Expire worker started");

    let mut state = shared.state.lock();
    while !state.stopping {
        let next = state.pending.peek().map(|entry| entry.when_expire);
        match next {
            Some(when_expire) if when_expire <= Instant::now() => {
                if let Some(entry) = state.pending.pop() {
                    MutexGuard::unlocked(&mut state, || {
                        trace!("Request for {} expired", entry.owner);
                        entry.fire(UStatus::new(UCode::DeadlineExceeded, EXPIRED_MESSAGE));
                    });
                }
            }
            Some(when_expire) => {
                shared.wake.wait_until(&mut state, when_expire);
            }
            None => shared.wake.wait(&mut state),
        }
    }

    debug!("Expire worker stopped");
}

/// A client's view of an [`ExpireWorker`]
///
/// Entries enqueued through a service are cancelled when the service is dropped.
pub struct ExpireService {
    worker: Arc<ExpireWorker>,
    owner: OwnerId,
}

impl ExpireService {
    /// Create a service on the process-wide worker
    pub fn new() -> crate::Result<Self> {
        Ok(Self::with_worker(ExpireWorker::global()?))
    }

    /// Create a service on a specific worker
    pub fn with_worker(worker: Arc<ExpireWorker>) -> Self {
        Self {
            worker,
            owner: OwnerId::next(),
        }
    }

    /// Schedule `expire` for `when_expire`, see [`ExpireWorker::enqueue`]
    pub fn enqueue<F>(&self, when_expire: Instant, listener: ListenHandle, expire: F)
    where
        F: FnOnce(UStatus) + Send + 'static,
    {
        self.worker.enqueue(when_expire, listener, expire, self.owner);
    }

    /// Owner ID tagging this service's entries
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Worker this service schedules on
    pub fn worker(&self) -> &Arc<ExpireWorker> {
        &self.worker
    }

    /// Number of this service's entries still pending
    pub fn pending(&self) -> usize {
        self.worker.pending_for(self.owner)
    }
}

impl Drop for ExpireService {
    fn drop(&mut self) {
        self.worker.scrub(self.owner);
    }
}

impl fmt::Debug for ExpireService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpireService")
            .field("owner", &self.owner)
            .finish()
    }
}
