//! Sharded running mean/variance

use std::cell::Cell;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam::utils::CachePadded;
use serde::Serialize;

use crate::constants::statistics::SAMPLE_SHARDS;

/// Per-shard accumulators
///
/// Samples are folded in as offsets from the statistic's reference value.
/// Offsets and squared offsets are summed as exact integers, so the
/// variance does not lose precision when samples are large and close
/// together, as nanosecond timings are.
#[derive(Debug, Default)]
struct Shard {
    count: AtomicU64,
    total: AtomicU64,
    /// Sum of offsets, wrapping
    offsets: AtomicI64,
    /// Sum of squared offsets as a wrapping `u128` split in two words
    squares_lo: AtomicU64,
    squares_hi: AtomicU64,
}

impl Shard {
    fn record(&self, value: u64, offset: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(value, Ordering::Relaxed);
        self.offsets.fetch_add(offset, Ordering::Relaxed);

        let square = u128::from(offset.unsigned_abs()).pow(2);
        let lo = square as u64;
        let previous = self.squares_lo.fetch_add(lo, Ordering::Relaxed);
        let carry = u64::from(previous.overflowing_add(lo).1);
        let hi = ((square >> 64) as u64).wrapping_add(carry);
        if hi != 0 {
            self.squares_hi.fetch_add(hi, Ordering::Relaxed);
        }
    }

    fn squares(&self) -> u128 {
        let hi = u128::from(self.squares_hi.load(Ordering::Relaxed));
        let lo = u128::from(self.squares_lo.load(Ordering::Relaxed));
        (hi << 64) | lo
    }

    fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.total.store(0, Ordering::Relaxed);
        self.offsets.store(0, Ordering::Relaxed);
        self.squares_lo.store(0, Ordering::Relaxed);
        self.squares_hi.store(0, Ordering::Relaxed);
    }
}

/// Sample variance from exact shifted sums
///
/// `n * squares - offsets^2` is the exact numerator when it fits in an
/// `i128`; otherwise the same formula is evaluated in `f64`.
fn variance(count: u64, offsets: i128, squares: u128) -> f64 {
    let n = i128::from(count);
    let exact = i128::try_from(squares)
        .ok()
        .and_then(|squares| n.checked_mul(squares))
        .zip(offsets.checked_mul(offsets))
        .map(|(scaled, square)| scaled - square);

    let n = count as f64;
    let numerator = match exact {
        Some(scaled) => scaled as f64 / n,
        None => squares as f64 - (offsets as f64).powi(2) / n,
    };
    (numerator / (n - 1.0)).max(0.0)
}

static NEXT_SHARD: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static SHARD_INDEX: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Shard for the calling thread, assigned round-robin on first use
fn shard_index() -> usize {
    SHARD_INDEX.with(|slot| match slot.get() {
        Some(index) => index,
        None => {
            let index = NEXT_SHARD.fetch_add(1, Ordering::Relaxed) % SAMPLE_SHARDS;
            slot.set(Some(index));
            index
        }
    })
}

/// Thread-safe running statistics over `u64` samples
///
/// Recorders on different threads land on different cache-padded shards, so
/// hot timing series do not contend on one cache line. Reads merge the
/// shards; all updates are commutative so the merged view is exact once
/// recorders are quiescent.
///
/// Standard deviation is the sample standard deviation (divides by `n - 1`)
/// and is `0.0` for fewer than two samples.
#[derive(Debug)]
pub struct SampleStatistic {
    shards: Box<[CachePadded<Shard>]>,
    max: AtomicU64,
    /// First sample since creation or reset, plus one; `0` while unset
    reference: AtomicU64,
}

impl Default for SampleStatistic {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleStatistic {
    #[must_use]
    pub fn new() -> Self {
        let shards = (0..SAMPLE_SHARDS)
            .map(|_| CachePadded::new(Shard::default()))
            .collect();
        Self {
            shards,
            max: AtomicU64::new(0),
            reference: AtomicU64::new(0),
        }
    }

    /// Fold one sample into the running statistics
    pub fn record(&self, value: u64) {
        let reference = self.reference(value);
        // Samples more than i64::MAX apart wrap; timings never are
        let offset = value.wrapping_sub(reference) as i64;
        self.shards[shard_index()].record(value, offset);
        self.max.fetch_max(value, Ordering::Relaxed);
    }

    /// The shared reference value, fixed by the first sample
    fn reference(&self, value: u64) -> u64 {
        let candidate = value.saturating_add(1);
        match self
            .reference
            .compare_exchange(0, candidate, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => candidate - 1,
            Err(current) => current - 1,
        }
    }

    /// Record a duration in nanoseconds, saturating at `u64::MAX`
    pub fn record_duration(&self, elapsed: Duration) {
        self.record(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.shards
            .iter()
            .map(|shard| shard.count.load(Ordering::Relaxed))
            .sum()
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.shards
            .iter()
            .fold(0u64, |acc, shard| {
                acc.saturating_add(shard.total.load(Ordering::Relaxed))
            })
    }

    #[must_use]
    #[inline]
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        self.summary().mean
    }

    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.summary().std_dev
    }

    /// Merge every shard into one consistent view
    #[must_use]
    pub fn summary(&self) -> SampleSummary {
        let mut count = 0u64;
        let mut total = 0u64;
        let mut offsets = 0i128;
        let mut squares = 0u128;
        for shard in self.shards.iter() {
            count += shard.count.load(Ordering::Relaxed);
            total = total.saturating_add(shard.total.load(Ordering::Relaxed));
            offsets += i128::from(shard.offsets.load(Ordering::Relaxed));
            squares = squares.wrapping_add(shard.squares());
        }

        let (mean, std_dev) = if count == 0 {
            (0.0, 0.0)
        } else {
            let reference = self.reference.load(Ordering::Acquire).saturating_sub(1);
            let mean = reference as f64 + offsets as f64 / count as f64;
            let std_dev = if count > 1 {
                variance(count, offsets, squares).sqrt()
            } else {
                0.0
            };
            (mean, std_dev)
        };

        SampleSummary {
            count,
            total,
            max: self.max(),
            mean,
            std_dev,
        }
    }

    /// Discard every recorded sample
    pub fn reset(&self) {
        for shard in self.shards.iter() {
            shard.reset();
        }
        self.max.store(0, Ordering::Relaxed);
        self.reference.store(0, Ordering::Release);
    }
}

/// Point-in-time view of a [`SampleStatistic`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SampleSummary {
    pub count: u64,
    pub total: u64,
    pub max: u64,
    pub mean: f64,
    pub std_dev: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_statistic() {
        let stats = SampleStatistic::new();
        let summary = stats.summary();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.max, 0);
        assert_eq!(summary.mean, 0.0);
        assert_eq!(summary.std_dev, 0.0);
    }

    #[test]
    fn test_single_sample_has_no_deviation() {
        let stats = SampleStatistic::new();
        stats.record(42);
        assert_eq!(stats.count(), 1);
        assert_eq!(stats.mean(), 42.0);
        assert_eq!(stats.std_dev(), 0.0);
    }

    #[test]
    fn test_known_series() {
        let stats = SampleStatistic::new();
        for value in [2, 4, 4, 4, 5, 5, 7, 9] {
            stats.record(value);
        }

        let summary = stats.summary();
        assert_eq!(summary.count, 8);
        assert_eq!(summary.total, 40);
        assert_eq!(summary.max, 9);
        assert!(close(summary.mean, 5.0));
        assert!(close(summary.std_dev, (32.0f64 / 7.0).sqrt()));
    }

    #[test]
    fn test_large_values_keep_small_deviation() {
        let stats = SampleStatistic::new();
        for i in 0..200_000u64 {
            stats.record(1_000_000_000 + i % 2);
        }

        let summary = stats.summary();
        assert!((summary.mean - 1_000_000_000.5).abs() < 1e-6);
        // Half the samples at each value: n / (4 (n - 1))
        let expected = (200_000.0f64 / (4.0 * 199_999.0)).sqrt();
        assert!(close(summary.std_dev, expected), "{}", summary.std_dev);
    }

    #[test]
    fn test_reference_reset_with_samples() {
        let stats = SampleStatistic::new();
        stats.record(5_000);
        stats.reset();
        stats.record(10);
        stats.record(20);
        assert!(close(stats.mean(), 15.0));
        assert!(close(stats.std_dev(), 50f64.sqrt()));
    }

    #[test]
    fn test_record_duration_uses_nanoseconds() {
        let stats = SampleStatistic::new();
        stats.record_duration(Duration::from_micros(3));
        assert_eq!(stats.total(), 3_000);
    }

    #[test]
    fn test_reset() {
        let stats = SampleStatistic::new();
        stats.record(10);
        stats.record(20);
        stats.reset();
        assert_eq!(stats.summary(), SampleSummary::default());
    }

    #[test]
    fn test_concurrent_records_merge() {
        let stats = Arc::new(SampleStatistic::new());
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for i in 0..500 {
                        stats.record(t * 1_000 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.count(), 4_000);
        assert_eq!(stats.max(), 7_499);
        let expected_total: u64 = (0..8u64)
            .flat_map(|t| (0..500).map(move |i| t * 1_000 + i))
            .sum();
        assert_eq!(stats.total(), expected_total);
    }
}
