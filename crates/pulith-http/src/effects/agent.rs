use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

/// Connection-slot bookkeeping shared by the requests that carry it.
///
/// Clones share state. With a socket limit, requests beyond the limit wait
/// for a slot and are counted in [`Agent::requests`] until they get one.
/// A slot is held by the response body and returned when the body ends,
/// fails, or is dropped.
///
/// # Examples
///
/// ```
/// use pulith_http::Agent;
///
/// let agent = Agent::with_max_sockets(1);
/// assert_eq!(agent.max_sockets(), Some(1));
/// assert_eq!(agent.sockets(), 0);
/// assert_eq!(agent.requests(), 0);
/// ```
#[derive(Clone, Default)]
pub struct Agent {
    inner: Arc<AgentState>,
}

#[derive(Default)]
struct AgentState {
    max_sockets: Option<usize>,
    slots: Option<Arc<Semaphore>>,
    sockets: AtomicUsize,
    requests: AtomicUsize,
}

impl Agent {
    /// An agent without a socket limit.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_sockets(max_sockets: usize) -> Self {
        let max_sockets = max_sockets.max(1);
        Self {
            inner: Arc::new(AgentState {
                max_sockets: Some(max_sockets),
                slots: Some(Arc::new(Semaphore::new(max_sockets))),
                ..AgentState::default()
            }),
        }
    }

    pub fn max_sockets(&self) -> Option<usize> {
        self.inner.max_sockets
    }

    /// Slots currently held by in-flight requests or unread bodies.
    pub fn sockets(&self) -> usize {
        self.inner.sockets.load(Ordering::Acquire)
    }

    /// Requests waiting for a free slot.
    pub fn requests(&self) -> usize {
        self.inner.requests.load(Ordering::Acquire)
    }

    /// Wait for a slot. Dropping the returned future while it waits
    /// withdraws the request from the queue.
    pub(crate) async fn checkout(&self) -> SocketLease {
        let permit = match &self.inner.slots {
            Some(slots) => {
                let _queued = Queued::enter(&self.inner);
                Arc::clone(slots).acquire_owned().await.ok()
            }
            None => None,
        };
        self.inner.sockets.fetch_add(1, Ordering::AcqRel);
        trace!(sockets = self.sockets(), "agent slot acquired");
        SocketLease {
            state: Arc::clone(&self.inner),
            _permit: permit,
        }
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("max_sockets", &self.max_sockets())
            .field("sockets", &self.sockets())
            .field("requests", &self.requests())
            .finish()
    }
}

struct Queued<'a>(&'a AgentState);

impl<'a> Queued<'a> {
    fn enter(state: &'a AgentState) -> Self {
        state.requests.fetch_add(1, Ordering::AcqRel);
        Queued(state)
    }
}

impl Drop for Queued<'_> {
    fn drop(&mut self) {
        self.0.requests.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A held agent slot, released on drop.
pub(crate) struct SocketLease {
    state: Arc<AgentState>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Drop for SocketLease {
    fn drop(&mut self) {
        self.state.sockets.fetch_sub(1, Ordering::AcqRel);
        trace!("agent slot released");
    }
}

impl fmt::Debug for SocketLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketLease").finish_non_exhaustive()
    }
}
