//! Per-connection statistics
//!
//! One [`ConnectionStats`] holder exists per live connection, created on the
//! first request seen for the connection and removed by its close listener.
//! Removal is synchronous and idempotent: a listener firing twice, or two
//! listeners racing, removes the holder once.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tracing::debug;

use super::snapshot::{CounterSummary, TimingSummary};
use super::types::{ByteCount, RequestCount};
use crate::connection::{CloseNotifier, ConnectionId};
use crate::statistic::{CounterStatistic, SampleStatistic};

/// Counters for one live connection
#[derive(Debug)]
pub struct ConnectionStats {
    id: ConnectionId,
    opened: Instant,
    requests: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

impl ConnectionStats {
    fn new(id: ConnectionId) -> Self {
        Self {
            id,
            opened: Instant::now(),
            requests: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Time since the first request on this connection was seen
    #[must_use]
    pub fn age(&self) -> Duration {
        self.opened.elapsed()
    }

    #[must_use]
    pub fn requests(&self) -> RequestCount {
        RequestCount::new(self.requests.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn bytes_read(&self) -> ByteCount {
        ByteCount::new(self.bytes_read.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn bytes_written(&self) -> ByteCount {
        ByteCount::new(self.bytes_written.load(Ordering::Relaxed))
    }

    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_bytes_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn add_bytes_written(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    connections: DashMap<ConnectionId, Arc<ConnectionStats>>,
    tracked: CounterStatistic,
    duration: SampleStatistic,
    closed_requests: AtomicU64,
    closed_bytes_read: AtomicU64,
    closed_bytes_written: AtomicU64,
}

impl RegistryInner {
    /// Remove `holder` if it is still the one registered for `id`
    fn complete(&self, id: ConnectionId, holder: &Arc<ConnectionStats>) -> bool {
        let Some((_, stats)) = self
            .connections
            .remove_if(&id, |_, current| Arc::ptr_eq(current, holder))
        else {
            return false;
        };

        let duration = stats.age();
        let requests = stats.requests().get();
        let bytes_read = stats.bytes_read().get();
        let bytes_written = stats.bytes_written().get();

        self.tracked.decrement();
        self.duration.record_duration(duration);
        self.closed_requests.fetch_add(requests, Ordering::Relaxed);
        self.closed_bytes_read.fetch_add(bytes_read, Ordering::Relaxed);
        self.closed_bytes_written
            .fetch_add(bytes_written, Ordering::Relaxed);

        debug!(
            connection = %id,
            requests,
            bytes_read,
            bytes_written,
            duration_ms = duration.as_millis() as u64,
            "Connection statistics closed"
        );
        true
    }
}

/// Registry of per-connection statistics, keyed by connection id
///
/// Cheap to clone; clones share the same map.
#[derive(Clone, Default)]
pub struct ConnectionStatsRegistry {
    inner: Arc<RegistryInner>,
}

impl ConnectionStatsRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Holder for `connection`, created on first sight
    ///
    /// Creating the holder registers a close listener on the connection;
    /// later calls for the same id return the same holder.
    pub fn track(&self, connection: &dyn CloseNotifier) -> Arc<ConnectionStats> {
        let id = connection.id();
        if let Some(existing) = self.inner.connections.get(&id) {
            return Arc::clone(existing.value());
        }

        let (stats, inserted) = match self.inner.connections.entry(id) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let stats = Arc::new(ConnectionStats::new(id));
                entry.insert(Arc::clone(&stats));
                (stats, true)
            }
        };

        // Registered outside the map guard: the listener may fire inline
        if inserted {
            self.inner.tracked.increment();
            debug!(connection = %id, "Tracking connection statistics");

            let registry = Arc::downgrade(&self.inner);
            let holder = Arc::clone(&stats);
            connection.on_close(Box::new(move |closed| {
                if let Some(registry) = registry.upgrade() {
                    registry.complete(closed, &holder);
                }
            }));
        }
        stats
    }

    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<Arc<ConnectionStats>> {
        self.inner
            .connections
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Number of live holders
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.connections.is_empty()
    }

    #[must_use]
    pub fn summary(&self) -> ConnectionSummary {
        let inner = &self.inner;
        ConnectionSummary {
            open: inner.connections.len(),
            tracked: CounterSummary::from(&inner.tracked),
            duration: TimingSummary::from(inner.duration.summary()),
            closed_requests: RequestCount::new(inner.closed_requests.load(Ordering::Relaxed)),
            closed_bytes_read: ByteCount::new(inner.closed_bytes_read.load(Ordering::Relaxed)),
            closed_bytes_written: ByteCount::new(
                inner.closed_bytes_written.load(Ordering::Relaxed),
            ),
        }
    }

    /// Reset lifetime totals; live holders are kept
    pub fn reset(&self) {
        let inner = &self.inner;
        inner.tracked.reset();
        inner.duration.reset();
        inner.closed_requests.store(0, Ordering::Relaxed);
        inner.closed_bytes_read.store(0, Ordering::Relaxed);
        inner.closed_bytes_written.store(0, Ordering::Relaxed);
    }
}

impl fmt::Debug for ConnectionStatsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionStatsRegistry")
            .field("open", &self.len())
            .finish_non_exhaustive()
    }
}

/// Aggregate view over tracked connections
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ConnectionSummary {
    /// Holders currently registered
    pub open: usize,
    pub tracked: CounterSummary,
    /// Lifetime of closed connections, first request to close
    pub duration: TimingSummary,
    pub closed_requests: RequestCount,
    pub closed_bytes_read: ByteCount,
    pub closed_bytes_written: ByteCount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::CloseSignal;
    use std::thread;

    #[test]
    fn test_track_creates_one_holder_per_connection() {
        let registry = ConnectionStatsRegistry::new();
        let signal = CloseSignal::new(ConnectionId::next());

        let first = registry.track(&signal);
        let second = registry.track(&signal);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.summary().tracked.total, 1);
    }

    #[test]
    fn test_close_removes_holder_and_folds_totals() {
        let registry = ConnectionStatsRegistry::new();
        let signal = CloseSignal::new(ConnectionId::next());
        let stats = registry.track(&signal);
        stats.record_request();
        stats.add_bytes_read(10);
        stats.add_bytes_written(20);

        signal.close();

        assert!(registry.is_empty());
        assert!(registry.get(signal.id()).is_none());
        let summary = registry.summary();
        assert_eq!(summary.open, 0);
        assert_eq!(summary.tracked.current, 0);
        assert_eq!(summary.duration.count, 1);
        assert_eq!(summary.closed_requests.get(), 1);
        assert_eq!(summary.closed_bytes_read.get(), 10);
        assert_eq!(summary.closed_bytes_written.get(), 20);
    }

    #[test]
    fn test_track_after_close_is_removed_immediately() {
        let registry = ConnectionStatsRegistry::new();
        let signal = CloseSignal::new(ConnectionId::next());
        signal.close();

        registry.track(&signal);
        assert!(registry.is_empty());
        assert_eq!(registry.summary().duration.count, 1);
    }

    #[test]
    fn test_completion_is_idempotent() {
        let registry = ConnectionStatsRegistry::new();
        let signal = CloseSignal::new(ConnectionId::next());
        let stats = registry.track(&signal);

        assert!(registry.inner.complete(signal.id(), &stats));
        assert!(!registry.inner.complete(signal.id(), &stats));
        assert_eq!(registry.summary().tracked.current, 0);
    }

    #[test]
    fn test_concurrent_track_registers_one_listener() {
        let registry = ConnectionStatsRegistry::new();
        let signal = Arc::new(CloseSignal::new(ConnectionId::next()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let signal = Arc::clone(&signal);
                thread::spawn(move || registry.track(signal.as_ref()))
            })
            .collect();
        let holders: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(holders.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.summary().tracked.total, 1);

        signal.close();
        assert!(registry.is_empty());
        assert_eq!(registry.summary().duration.count, 1);
    }

    #[test]
    fn test_reset_keeps_live_holders() {
        let registry = ConnectionStatsRegistry::new();
        let open = CloseSignal::new(ConnectionId::next());
        let closed = CloseSignal::new(ConnectionId::next());
        registry.track(&open);
        registry.track(&closed);
        closed.close();

        registry.reset();

        let summary = registry.summary();
        assert_eq!(summary.open, 1);
        assert_eq!(summary.tracked.current, 1);
        assert_eq!(summary.tracked.total, 0);
        assert_eq!(summary.duration.count, 0);
    }
}
