//! Statistics snapshot types
//!
//! Immutable, serializable views taken by
//! [`StatisticsHandler::snapshot`](super::StatisticsHandler::snapshot).
//! All times are in nanoseconds.

use std::time::Duration;

use serde::Serialize;

use super::connection_stats::ConnectionSummary;
use super::types::{ByteCount, ResponseClassCounts};
use crate::statistic::{CounterStatistic, SampleSummary};

/// Current, total and peak of a counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSummary {
    pub current: i64,
    pub total: u64,
    pub max: i64,
}

impl From<&CounterStatistic> for CounterSummary {
    fn from(counter: &CounterStatistic) -> Self {
        Self {
            current: counter.current(),
            total: counter.total(),
            max: counter.max(),
        }
    }
}

/// Count, total, max, mean and standard deviation of a timing series
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimingSummary {
    pub count: u64,
    pub total_nanos: u64,
    pub max_nanos: u64,
    pub mean_nanos: f64,
    pub std_dev_nanos: f64,
}

impl From<SampleSummary> for TimingSummary {
    fn from(summary: SampleSummary) -> Self {
        Self {
            count: summary.count,
            total_nanos: summary.total,
            max_nanos: summary.max,
            mean_nanos: summary.mean,
            std_dev_nanos: summary.std_dev,
        }
    }
}

impl TimingSummary {
    #[must_use]
    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.total_nanos)
    }

    #[must_use]
    pub fn max(&self) -> Duration {
        Duration::from_nanos(self.max_nanos)
    }

    #[must_use]
    pub fn mean(&self) -> Duration {
        Duration::from_nanos(self.mean_nanos.round() as u64)
    }
}

/// Snapshot of request statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    /// Time since the statistics were created or last reset
    pub since_reset: Duration,
    pub requests: CounterSummary,
    pub handlings: CounterSummary,
    pub processings: CounterSummary,
    pub request_time: TimingSummary,
    pub handling_time: TimingSummary,
    pub processing_time: TimingSummary,
    pub responses: ResponseClassCounts,
    pub bytes_read: ByteCount,
    pub bytes_written: ByteCount,
    pub connections: ConnectionSummary,
}

impl StatisticsSnapshot {
    /// Responses with a classified status
    #[must_use]
    pub fn responses_total(&self) -> u64 {
        self.responses.total()
    }

    /// Share of classified responses that were 5xx, in percent
    #[must_use]
    pub fn error_rate_percent(&self) -> f64 {
        let total = self.responses_total();
        if total == 0 {
            return 0.0;
        }
        (self.responses.server_error.get() as f64 / total as f64) * 100.0
    }

    /// Completed requests per second since the last reset
    #[must_use]
    pub fn requests_per_second(&self) -> f64 {
        let secs = self.since_reset.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.request_time.count as f64 / secs
    }
}
