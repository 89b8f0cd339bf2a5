//! Owner/caller connection pairs around a callback
//!
//! [`establish`] wraps a callback in a shared slot and returns two views of it:
//!
//! - a [`Handle`], held by whoever owns the callback's lifetime. Resetting or dropping it
//!   disconnects the callback, waits for invocations already running on other threads, and
//!   then runs the optional cleanup exactly once.
//! - a [`Callable`], which can be cloned freely and handed to whoever triggers the callback.
//!   Calls made after the handle has been reset are no-ops that return `None`.
//!
//! A handle also reports itself disconnected once every callable has been dropped, since
//! nothing can invoke the callback any more.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a connection slot, shared by its handle and all its callables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

type Callback<A, R> = Box<dyn Fn(A) -> R + Send + Sync>;
type Cleanup<A, R> = Box<dyn FnOnce(&Callable<A, R>) + Send>;

struct SlotState {
    connected: bool,
    /// Threads currently inside the callback, one entry per invocation
    callers: Vec<ThreadId>,
}

struct Slot<A, R> {
    id: ConnectionId,
    state: Mutex<SlotState>,
    idle: Condvar,
    callback: Callback<A, R>,
}

/// Removes one in-flight entry when an invocation finishes, even by unwinding
struct InFlight<'a, A, R> {
    slot: &'a Slot<A, R>,
    thread: ThreadId,
}

impl<A, R> Drop for InFlight<'_, A, R> {
    fn drop(&mut self) {
        let mut state = self.slot.state.lock();
        if let Some(pos) = state.callers.iter().position(|id| *id == self.thread) {
            state.callers.swap_remove(pos);
        }
        self.slot.idle.notify_all();
    }
}

/// Connect `callback` without a cleanup step
pub fn establish<A, R, F>(callback: F) -> (Handle<A, R>, Callable<A, R>)
where
    F: Fn(A) -> R + Send + Sync + 'static,
{
    connect(Box::new(callback), None)
}

/// Connect `callback`, running `cleanup` once when the handle is reset or dropped
///
/// The cleanup receives a callable for the same slot, which identifies the connection (for
/// example as a key in a registration table). Dropping callables never runs the cleanup.
pub fn establish_with_cleanup<A, R, F, C>(callback: F, cleanup: C) -> (Handle<A, R>, Callable<A, R>)
where
    F: Fn(A) -> R + Send + Sync + 'static,
    C: FnOnce(&Callable<A, R>) + Send + 'static,
{
    connect(Box::new(callback), Some(Box::new(cleanup)))
}

fn connect<A, R>(
    callback: Callback<A, R>,
    cleanup: Option<Cleanup<A, R>>,
) -> (Handle<A, R>, Callable<A, R>) {
    let slot = Arc::new(Slot {
        id: ConnectionId::next(),
        state: Mutex::new(SlotState {
            connected: true,
            callers: Vec::new(),
        }),
        idle: Condvar::new(),
        callback,
    });

    let callable = Callable {
        slot: Some(Arc::clone(&slot)),
    };
    let handle = Handle {
        slot: Some(slot),
        cleanup,
    };
    (handle, callable)
}

/// Owning side of a connection
#[must_use = "dropping a Handle disconnects its callback immediately"]
pub struct Handle<A, R> {
    slot: Option<Arc<Slot<A, R>>>,
    cleanup: Option<Cleanup<A, R>>,
}

impl<A, R> Handle<A, R> {
    /// Whether the callback can still be invoked
    pub fn is_connected(&self) -> bool {
        match &self.slot {
            // Every other strong reference belongs to a callable
            Some(slot) => Arc::strong_count(slot) > 1 && slot.state.lock().connected,
            None => false,
        }
    }

    /// Connection identity, if this handle is attached to a slot
    pub fn id(&self) -> Option<ConnectionId> {
        self.slot.as_ref().map(|slot| slot.id)
    }

    /// Disconnect the callback
    ///
    /// After this returns, no invocation is running on another thread and every callable
    /// reports disconnected. An invocation on the calling thread (a callback resetting its own
    /// handle) is not waited for. The cleanup, if any, runs after the drain.
    pub fn reset(&mut self) {
        let Some(slot) = self.slot.take() else {
            return;
        };

        let current = thread::current().id();
        {
            let mut state = slot.state.lock();
            state.connected = false;
            while state.callers.iter().any(|id| *id != current) {
                slot.idle.wait(&mut state);
            }
        }

        if let Some(cleanup) = self.cleanup.take() {
            cleanup(&Callable { slot: Some(slot) });
        }
    }
}

impl<A, R> Drop for Handle<A, R> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<A, R> Default for Handle<A, R> {
    fn default() -> Self {
        Self {
            slot: None,
            cleanup: None,
        }
    }
}

impl<A, R> fmt::Debug for Handle<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Invoking side of a connection
pub struct Callable<A, R> {
    slot: Option<Arc<Slot<A, R>>>,
}

impl<A, R> Callable<A, R> {
    /// Invoke the callback, or return `None` if the connection is gone
    pub fn call(&self, args: A) -> Option<R> {
        let slot = self.slot.as_deref()?;
        let thread = thread::current().id();
        {
            let mut state = slot.state.lock();
            if !state.connected {
                return None;
            }
            state.callers.push(thread);
        }

        let _in_flight = InFlight { slot, thread };
        Some((slot.callback)(args))
    }

    /// Whether a call would reach the callback
    pub fn is_connected(&self) -> bool {
        self.slot
            .as_ref()
            .is_some_and(|slot| slot.state.lock().connected)
    }

    /// Connection identity, if this callable is attached to a slot
    pub fn id(&self) -> Option<ConnectionId> {
        self.slot.as_ref().map(|slot| slot.id)
    }

    /// Release this copy's reference; other copies are unaffected
    pub fn reset(&mut self) {
        self.slot = None;
    }
}

impl<A, R> Clone for Callable<A, R> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<A, R> Default for Callable<A, R> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<A, R> PartialEq for Callable<A, R> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<A, R> Eq for Callable<A, R> {}

impl<A, R> Hash for Callable<A, R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl<A, R> fmt::Debug for Callable<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("id", &self.id())
            .field("connected", &self.is_connected())
            .finish()
    }
}
