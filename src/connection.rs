//! Connection identity and close notification
//!
//! Both the pool and the per-connection statistics need to learn when a
//! transport connection goes away. Transports expose that through
//! [`CloseNotifier`]; [`CloseSignal`] is a ready-made implementation they can
//! embed.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use tracing::trace;

pub use crate::types::ConnectionId;

/// One-shot callback fired with the id of the connection that closed
pub type CloseListener = Box<dyn FnOnce(ConnectionId) + Send + 'static>;

/// A connection that can report its identity and its closing
///
/// Implementations must invoke every registered listener exactly once when
/// the connection closes. A listener registered after the close must be
/// invoked immediately.
pub trait CloseNotifier: Send + Sync {
    fn id(&self) -> ConnectionId;

    fn on_close(&self, listener: CloseListener);
}

enum SignalState {
    Open(Vec<CloseListener>),
    Closed,
}

/// Exactly-once close listener registry
///
/// Listeners run on the thread that calls [`close`](Self::close), outside the
/// internal lock, so a listener may register further listeners or query the
/// signal without deadlocking.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use muxpool::connection::{CloseSignal, ConnectionId};
///
/// let signal = CloseSignal::new(ConnectionId::next());
/// let fired = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&fired);
/// signal.register(Box::new(move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// }));
///
/// assert!(signal.close());
/// assert!(!signal.close());
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
/// ```
pub struct CloseSignal {
    id: ConnectionId,
    state: Mutex<SignalState>,
}

impl CloseSignal {
    #[must_use]
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            state: Mutex::new(SignalState::Open(Vec::new())),
        }
    }

    #[must_use]
    #[inline]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Register a listener, running it at once if already closed
    pub fn register(&self, listener: CloseListener) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *state {
            SignalState::Open(listeners) => listeners.push(listener),
            SignalState::Closed => {
                drop(state);
                listener(self.id);
            }
        }
    }

    /// Mark the connection closed and fire every listener once
    ///
    /// Returns `false` if the signal had already been closed.
    pub fn close(&self) -> bool {
        let listeners = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, SignalState::Closed) {
                SignalState::Open(listeners) => listeners,
                SignalState::Closed => return false,
            }
        };

        trace!(connection = %self.id, listeners = listeners.len(), "Firing close listeners");
        for listener in listeners {
            listener(self.id);
        }
        true
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            SignalState::Closed
        )
    }
}

impl fmt::Debug for CloseSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseSignal")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl CloseNotifier for CloseSignal {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn on_close(&self, listener: CloseListener) {
        self.register(listener);
    }
}
