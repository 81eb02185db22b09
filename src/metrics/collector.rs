//! Lock-free statistics collector

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use super::connection_stats::ConnectionStatsRegistry;
use super::snapshot::{CounterSummary, StatisticsSnapshot, TimingSummary};
use super::types::{ByteCount, ResponseCounters, StatusClass};
use crate::statistic::{CounterStatistic, SampleStatistic};

#[derive(Debug)]
struct CollectorInner {
    requests: CounterStatistic,
    handlings: CounterStatistic,
    processings: CounterStatistic,
    request_time: SampleStatistic,
    handling_time: SampleStatistic,
    processing_time: SampleStatistic,
    responses: ResponseCounters,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    connections: ConnectionStatsRegistry,
    reset_at: Mutex<Instant>,
}

/// Request statistics shared by every stage that records into them
///
/// Cheap to clone; clones record into the same series. Several
/// [`StatisticsHandler`](super::StatisticsHandler)s can share one collector
/// to aggregate over multiple handler chains.
#[derive(Debug, Clone)]
pub struct StatisticsCollector {
    inner: Arc<CollectorInner>,
}

impl Default for StatisticsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CollectorInner {
                requests: CounterStatistic::new(),
                handlings: CounterStatistic::new(),
                processings: CounterStatistic::new(),
                request_time: SampleStatistic::new(),
                handling_time: SampleStatistic::new(),
                processing_time: SampleStatistic::new(),
                responses: ResponseCounters::new(),
                bytes_read: AtomicU64::new(0),
                bytes_written: AtomicU64::new(0),
                connections: ConnectionStatsRegistry::new(),
                reset_at: Mutex::new(Instant::now()),
            }),
        }
    }

    /// Requests between handler entry and completion
    #[must_use]
    pub fn requests(&self) -> &CounterStatistic {
        &self.inner.requests
    }

    /// Calls into the wrapped handler still in progress
    #[must_use]
    pub fn handlings(&self) -> &CounterStatistic {
        &self.inner.handlings
    }

    /// Requests between processor start and completion
    #[must_use]
    pub fn processings(&self) -> &CounterStatistic {
        &self.inner.processings
    }

    #[must_use]
    pub fn request_time(&self) -> &SampleStatistic {
        &self.inner.request_time
    }

    #[must_use]
    pub fn handling_time(&self) -> &SampleStatistic {
        &self.inner.handling_time
    }

    #[must_use]
    pub fn processing_time(&self) -> &SampleStatistic {
        &self.inner.processing_time
    }

    #[must_use]
    pub fn responses(&self) -> &ResponseCounters {
        &self.inner.responses
    }

    #[must_use]
    pub fn connections(&self) -> &ConnectionStatsRegistry {
        &self.inner.connections
    }

    #[must_use]
    pub fn bytes_read(&self) -> ByteCount {
        ByteCount::new(self.inner.bytes_read.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn bytes_written(&self) -> ByteCount {
        ByteCount::new(self.inner.bytes_written.load(Ordering::Relaxed))
    }

    pub(crate) fn request_started(&self) {
        self.inner.requests.increment();
        self.inner.handlings.increment();
    }

    pub(crate) fn handling_finished(&self, handle_began: Instant) {
        self.inner.handlings.decrement();
        self.inner
            .handling_time
            .record_duration(handle_began.elapsed());
    }

    /// Close a request whose processing never started
    ///
    /// Covers a handler that refused the request and a processor dropped
    /// before it ran. Processing time gets a zero sample so every closed
    /// request contributes one sample to each timing series.
    pub(crate) fn request_not_processed(&self, request_began: Instant) {
        let inner = &self.inner;
        inner.requests.decrement();
        inner.processing_time.record(0);
        inner.request_time.record_duration(request_began.elapsed());
    }

    pub(crate) fn processing_started(&self) {
        self.inner.processings.increment();
    }

    pub(crate) fn request_completed(&self, request_began: Instant, process_began: Instant) {
        let inner = &self.inner;
        inner.processings.decrement();
        inner.requests.decrement();
        inner
            .processing_time
            .record_duration(process_began.elapsed());
        inner.request_time.record_duration(request_began.elapsed());
    }

    pub(crate) fn record_status(&self, status: u16) -> Option<StatusClass> {
        self.inner.responses.record(status)
    }

    pub(crate) fn add_bytes_read(&self, bytes: u64) {
        self.inner.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn add_bytes_written(&self, bytes: u64) {
        self.inner.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let inner = &self.inner;
        let since_reset = inner
            .reset_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed();
        StatisticsSnapshot {
            since_reset,
            requests: CounterSummary::from(&inner.requests),
            handlings: CounterSummary::from(&inner.handlings),
            processings: CounterSummary::from(&inner.processings),
            request_time: TimingSummary::from(inner.request_time.summary()),
            handling_time: TimingSummary::from(inner.handling_time.summary()),
            processing_time: TimingSummary::from(inner.processing_time.summary()),
            responses: inner.responses.snapshot(),
            bytes_read: self.bytes_read(),
            bytes_written: self.bytes_written(),
            connections: inner.connections.summary(),
        }
    }

    /// Zero every series and counter; maxima drop to current values
    pub fn reset(&self) {
        let inner = &self.inner;
        *inner.reset_at.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
        inner.requests.reset();
        inner.handlings.reset();
        inner.processings.reset();
        inner.request_time.reset();
        inner.handling_time.reset();
        inner.processing_time.reset();
        inner.responses.reset();
        inner.bytes_read.store(0, Ordering::Relaxed);
        inner.bytes_written.store(0, Ordering::Relaxed);
        inner.connections.reset();
    }
}
