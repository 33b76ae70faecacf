//! Connection identity and lifetime tracking.
//!
//! # Responsibilities
//! - Number accepted connections; the number doubles as the session id in logs
//! - Count open connections so the server can drain them on shutdown
//!
//! # Design Decisions
//! - Ids are process-unique, not globally unique: they only correlate log
//!   lines of one run
//! - Draining waits on a `Notify` fired by the last guard, no polling

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counter {
    open: AtomicU64,
    drained: Notify,
}

/// Counts sessions between accept and driver exit.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    counter: Arc<Counter>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted connection. Dropping the guard unregisters it.
    pub fn track(&self) -> ConnectionGuard {
        self.counter.open.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            counter: Arc::clone(&self.counter),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.counter.open.load(Ordering::SeqCst)
    }

    /// Resolve once no tracked connection is left.
    pub async fn wait_for_shutdown(&self) {
        loop {
            let drained = self.counter.drained.notified();
            if self.active_count() == 0 {
                return;
            }
            drained.await;
        }
    }
}

/// Keeps one connection counted while alive.
#[derive(Debug)]
pub struct ConnectionGuard {
    counter: Arc<Counter>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.counter.open.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.counter.drained.notify_waiters();
        }
        tracing::trace!(session = %self.id, "Connection released");
    }
}
