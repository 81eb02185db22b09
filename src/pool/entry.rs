//! Pool entry with a lock-free state word
//!
//! Each entry packs its lifecycle state and in-use count into one `AtomicU64`
//! (see [`crate::constants::entry_word`]). Acquire, release and removal are
//! single-word CAS operations, so the in-use count can never be observed
//! above capacity or below zero and a removed entry can never be acquired.
//!
//! While the entry is pending the count field holds the number of waiters
//! promised a unit of its capacity. Activation turns those promises into
//! in-use units in the same CAS, so no other caller can take them before
//! the waiters claim them.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::watch;

use crate::constants::entry_word::{ACTIVE, IN_USE_MASK, PENDING, REMOVED, STATE_MASK};
use crate::error::InvariantViolation;
use crate::types::{EntryId, MaxMultiplex};

/// Lifecycle of a pool entry: `Pending -> Active -> Removed`
///
/// A pending entry may also go straight to `Removed` when establishment
/// fails. `Removed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    Pending,
    Active,
    Removed,
}

impl EntryState {
    #[inline]
    fn of(word: u64) -> Self {
        match word & STATE_MASK {
            PENDING => Self::Pending,
            ACTIVE => Self::Active,
            _ => Self::Removed,
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Removed => "removed",
        })
    }
}

/// Why [`PoolEntry::try_acquire`] did not hand out capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoCapacity {
    /// The entry is pending or removed
    NotActive(EntryState),
    /// Every unit of capacity is leased
    Full,
}

/// Establishment progress, observed by callers waiting on a pending entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Phase {
    Pending,
    Active,
    Failed(String),
}

/// One pooled connection slot
pub struct PoolEntry<C> {
    id: EntryId,
    word: AtomicU64,
    capacity: OnceLock<MaxMultiplex>,
    connection: OnceLock<Arc<C>>,
    /// Capacity expected while pending, bounds the promise count
    expected: u64,
    /// Units held for waiters at activation
    held: AtomicUsize,
    /// Waiters that have claimed or forfeited since activation
    settled: AtomicUsize,
    phase: watch::Sender<Phase>,
}

impl<C> PoolEntry<C> {
    /// Create a pending entry
    ///
    /// `expected` is the capacity assumed before the connection exists and
    /// bounds how many waiters [`try_promise`](Self::try_promise) attaches.
    #[must_use]
    pub fn pending(id: EntryId, expected: MaxMultiplex) -> Self {
        let (phase, _) = watch::channel(Phase::Pending);
        Self {
            id,
            word: AtomicU64::new(PENDING),
            capacity: OnceLock::new(),
            connection: OnceLock::new(),
            expected: expected.get() as u64,
            held: AtomicUsize::new(0),
            settled: AtomicUsize::new(0),
            phase,
        }
    }

    #[must_use]
    #[inline]
    pub fn id(&self) -> EntryId {
        self.id
    }

    #[must_use]
    #[inline]
    pub fn state(&self) -> EntryState {
        EntryState::of(self.word.load(Ordering::Acquire))
    }

    #[must_use]
    #[inline]
    pub fn in_use(&self) -> usize {
        let word = self.word.load(Ordering::Acquire);
        match EntryState::of(word) {
            EntryState::Pending => 0,
            _ => (word & IN_USE_MASK) as usize,
        }
    }

    /// Waiters attached while pending
    #[must_use]
    pub fn promised(&self) -> usize {
        let word = self.word.load(Ordering::Acquire);
        match EntryState::of(word) {
            EntryState::Pending => (word & IN_USE_MASK) as usize,
            _ => 0,
        }
    }

    /// Capacity, fixed at activation; `None` while pending
    #[must_use]
    pub fn capacity(&self) -> Option<MaxMultiplex> {
        self.capacity.get().copied()
    }

    #[must_use]
    pub fn connection(&self) -> Option<&Arc<C>> {
        self.connection.get()
    }

    /// Units of capacity still available to `try_acquire`
    #[must_use]
    pub fn spare(&self) -> usize {
        let word = self.word.load(Ordering::Acquire);
        if EntryState::of(word) != EntryState::Active {
            return 0;
        }
        let capacity = self.capacity.get().map_or(0, |c| c.get());
        capacity.saturating_sub((word & IN_USE_MASK) as usize)
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        let word = self.word.load(Ordering::Acquire);
        EntryState::of(word) == EntryState::Active && word & IN_USE_MASK == 0
    }

    /// Install the connection and its capacity, then switch to `Active`
    ///
    /// Every promised waiter, up to `capacity`, is given an in-use unit to
    /// claim. Returns `false` if the entry was removed while pending; the
    /// connection is then left unused.
    pub fn activate(&self, connection: Arc<C>, capacity: MaxMultiplex) -> bool {
        if self.capacity.set(capacity).is_err() || self.connection.set(connection).is_err() {
            return false;
        }

        let mut word = self.word.load(Ordering::Acquire);
        loop {
            if EntryState::of(word) != EntryState::Pending {
                self.held.store(0, Ordering::Release);
                return false;
            }
            let held = (word & IN_USE_MASK).min(capacity.get() as u64);
            // Published by the CAS below to anyone who observes `Active`
            self.held.store(held as usize, Ordering::Release);
            match self.word.compare_exchange_weak(
                word,
                ACTIVE | held,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => word = actual,
            }
        }
    }

    /// Take one unit of capacity
    ///
    /// Succeeds only while `Active` with `in_use < capacity`; returns the new
    /// in-use count.
    pub fn try_acquire(&self) -> Result<usize, NoCapacity> {
        let mut word = self.word.load(Ordering::Acquire);
        loop {
            let state = EntryState::of(word);
            if state != EntryState::Active {
                return Err(NoCapacity::NotActive(state));
            }
            let in_use = word & IN_USE_MASK;
            let capacity = self.capacity.get().map_or(0, |c| c.get()) as u64;
            if in_use >= capacity {
                return Err(NoCapacity::Full);
            }
            match self.word.compare_exchange_weak(
                word,
                word + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok((in_use + 1) as usize),
                Err(actual) => word = actual,
            }
        }
    }

    /// Return one unit of capacity taken for a lease issued against `lease`
    ///
    /// Works in any state: a removed entry still accepts releases from
    /// outstanding leases. Returns the remaining in-use count.
    pub fn release(&self, lease: EntryId) -> Result<usize, InvariantViolation> {
        if lease != self.id {
            return Err(InvariantViolation::WrongEntry {
                entry: self.id,
                lease,
            });
        }

        let mut word = self.word.load(Ordering::Acquire);
        loop {
            let in_use = word & IN_USE_MASK;
            if in_use == 0 || EntryState::of(word) == EntryState::Pending {
                return Err(InvariantViolation::DoubleRelease { entry: self.id });
            }
            match self.word.compare_exchange_weak(
                word,
                word - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok((in_use - 1) as usize),
                Err(actual) => word = actual,
            }
        }
    }

    /// Transition to `Removed`
    ///
    /// Only the call that performed the transition returns `true`.
    /// Outstanding leases stay valid.
    pub fn remove(&self) -> bool {
        self.word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                match EntryState::of(word) {
                    EntryState::Removed => None,
                    // Promises are not leases
                    EntryState::Pending => Some(REMOVED),
                    EntryState::Active => Some((word & IN_USE_MASK) | REMOVED),
                }
            })
            .is_ok()
    }

    /// Promise a waiter a unit of a pending entry's capacity
    ///
    /// At most `expected` promises are outstanding. Each one must end in
    /// exactly one [`claim`](Self::claim) or [`forfeit`](Self::forfeit).
    pub fn try_promise(&self) -> bool {
        self.word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                (EntryState::of(word) == EntryState::Pending
                    && word & IN_USE_MASK < self.expected)
                    .then_some(word + 1)
            })
            .is_ok()
    }

    /// Turn a promise into a unit of capacity once the entry is active
    ///
    /// Takes one of the units held at activation. A waiter beyond a
    /// capacity smaller than expected falls back to [`try_acquire`](Self::try_acquire).
    /// Returns `None` when no unit is available or the entry has been
    /// removed.
    pub fn claim(&self) -> Option<Arc<C>> {
        if self.state() == EntryState::Pending {
            return None;
        }
        let owned = self.settle();
        match (self.state(), self.connection.get()) {
            (EntryState::Active, Some(connection)) => {
                if owned || self.try_acquire().is_ok() {
                    return Some(Arc::clone(connection));
                }
                None
            }
            _ => {
                if owned {
                    let _ = self.release(self.id);
                }
                None
            }
        }
    }

    /// Withdraw a promise that will never be claimed
    ///
    /// While pending this frees the promise for another waiter. After
    /// activation it returns the held unit, if this waiter had one, and
    /// yields the remaining in-use count.
    pub fn forfeit(&self) -> Option<usize> {
        let mut word = self.word.load(Ordering::Acquire);
        while EntryState::of(word) == EntryState::Pending {
            if word & IN_USE_MASK == 0 {
                return None;
            }
            match self.word.compare_exchange_weak(
                word,
                word - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return None,
                Err(actual) => word = actual,
            }
        }

        if self.settle() {
            self.release(self.id).ok()
        } else {
            None
        }
    }

    /// Count one waiter as settled; `true` if it owned a held unit
    fn settle(&self) -> bool {
        self.settled.fetch_add(1, Ordering::AcqRel) < self.held.load(Ordering::Acquire)
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub(crate) fn publish(&self, phase: Phase) {
        self.phase.send_replace(phase);
    }
}

impl<C> fmt::Debug for PoolEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolEntry")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("in_use", &self.in_use())
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
