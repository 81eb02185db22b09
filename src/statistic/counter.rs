//! Gauge with running total and high-water mark

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Concurrent counter with `current`, `total` and `max`
///
/// `total` only grows: it counts every unit ever added. `max` is the highest
/// value `current` has reached since creation or the last [`reset`](Self::reset).
///
/// # Examples
/// ```
/// use muxpool::statistic::CounterStatistic;
///
/// let active = CounterStatistic::new();
/// active.increment();
/// active.increment();
/// active.decrement();
/// assert_eq!(active.current(), 1);
/// assert_eq!(active.total(), 2);
/// assert_eq!(active.max(), 2);
/// ```
#[derive(Debug, Default)]
pub struct CounterStatistic {
    current: AtomicI64,
    max: AtomicI64,
    total: AtomicU64,
}

impl CounterStatistic {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: AtomicI64::new(0),
            max: AtomicI64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Add one, returning the new current value
    #[inline]
    pub fn increment(&self) -> i64 {
        self.add(1)
    }

    /// Subtract one, returning the new current value
    #[inline]
    pub fn decrement(&self) -> i64 {
        self.add(-1)
    }

    /// Add `delta` (which may be negative), returning the new current value
    ///
    /// Positive deltas count towards `total`; negative ones never reduce it.
    pub fn add(&self, delta: i64) -> i64 {
        let value = self.current.fetch_add(delta, Ordering::AcqRel) + delta;
        if delta > 0 {
            self.total.fetch_add(delta.unsigned_abs(), Ordering::Relaxed);
            self.max.fetch_max(value, Ordering::Relaxed);
        }
        value
    }

    #[must_use]
    #[inline]
    pub fn current(&self) -> i64 {
        self.current.load(Ordering::Acquire)
    }

    #[must_use]
    #[inline]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    #[must_use]
    #[inline]
    pub fn max(&self) -> i64 {
        self.max.load(Ordering::Relaxed)
    }

    /// Zero the total and pull `max` down to the current value
    ///
    /// `current` is left alone: it describes things still in flight.
    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.max.store(self.current(), Ordering::Relaxed);
    }
}
