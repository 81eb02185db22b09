//! Request, stream and callback wrappers that record statistics
//!
//! The handler wraps each request it accepts. Everything downstream sees the
//! wrappers and records into the shared collector as a side effect of doing
//! its normal work.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use super::collector::StatisticsCollector;
use super::connection_stats::ConnectionStats;
use crate::connection::CloseNotifier;
use crate::constants::attributes;
use crate::error::PipelineError;
use crate::pipeline::{
    Attribute, ByteCounter, Callback, Content, Processor, Request, ResponseHead, Stream,
};

/// Request wrapper exposing per-request byte counts as attributes
///
/// [`attributes::BYTES_READ`] and [`attributes::BYTES_WRITTEN`] resolve to
/// live [`ByteCounter`]s; every other name is looked up on the wrapped
/// request.
pub struct StatisticsRequest {
    inner: Arc<dyn Request>,
    bytes_read: ByteCounter,
    bytes_written: ByteCounter,
}

impl StatisticsRequest {
    #[must_use]
    pub fn new(inner: Arc<dyn Request>) -> Self {
        Self {
            inner,
            bytes_read: ByteCounter::new(),
            bytes_written: ByteCounter::new(),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &Arc<dyn Request> {
        &self.inner
    }

    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.get()
    }

    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.get()
    }
}

impl Request for StatisticsRequest {
    fn connection(&self) -> &dyn CloseNotifier {
        self.inner.connection()
    }

    fn begin(&self) -> Instant {
        self.inner.begin()
    }

    fn attribute(&self, name: &str) -> Option<Attribute> {
        match name {
            attributes::BYTES_READ => Some(Attribute::Counter(self.bytes_read.clone())),
            attributes::BYTES_WRITTEN => Some(Attribute::Counter(self.bytes_written.clone())),
            _ => self.inner.attribute(name),
        }
    }
}

/// Processor wrapper returned by the statistics handler
///
/// The request is already counted as active when this is created. If it is
/// dropped without [`process`](Processor::process) running, the request is
/// closed as unprocessed.
pub(crate) struct StatisticsProcessor {
    pending: Option<Accepted>,
}

struct Accepted {
    next: Box<dyn Processor>,
    request: Arc<StatisticsRequest>,
    connection: Arc<ConnectionStats>,
    collector: StatisticsCollector,
}

impl StatisticsProcessor {
    pub(crate) fn new(
        next: Box<dyn Processor>,
        request: Arc<StatisticsRequest>,
        connection: Arc<ConnectionStats>,
        collector: StatisticsCollector,
    ) -> Self {
        Self {
            pending: Some(Accepted {
                next,
                request,
                connection,
                collector,
            }),
        }
    }
}

impl Drop for StatisticsProcessor {
    fn drop(&mut self) {
        if let Some(accepted) = self.pending.take() {
            debug!(
                connection = %accepted.connection.id(),
                "Processor dropped before processing"
            );
            accepted
                .collector
                .request_not_processed(accepted.request.begin());
        }
    }
}

#[async_trait]
impl Processor for StatisticsProcessor {
    async fn process(
        mut self: Box<Self>,
        _request: Arc<dyn Request>,
        stream: &mut dyn Stream,
        callback: Box<dyn Callback>,
    ) {
        let Some(Accepted {
            next,
            request,
            connection,
            collector,
        }) = self.pending.take()
        else {
            return callback.failed(PipelineError::Cancelled.into());
        };

        collector.processing_started();
        let completion = Completion {
            collector: collector.clone(),
            request_began: request.begin(),
            process_began: Instant::now(),
        };
        let callback = Box::new(StatisticsCallback {
            pending: Some((callback, completion)),
        });
        let mut stream = StatisticsStream {
            inner: stream,
            request: Arc::clone(&request),
            connection,
            collector,
        };

        next.process(request, &mut stream, callback).await;
    }
}

/// Stream wrapper counting bytes and classifying response statuses
struct StatisticsStream<'a> {
    inner: &'a mut dyn Stream,
    request: Arc<StatisticsRequest>,
    connection: Arc<ConnectionStats>,
    collector: StatisticsCollector,
}

impl Stream for StatisticsStream<'_> {
    fn read_content(&mut self) -> Option<Content> {
        let content = self.inner.read_content()?;
        let bytes = content.remaining() as u64;
        if bytes > 0 {
            self.request.bytes_read.add(bytes);
            self.connection.add_bytes_read(bytes);
            self.collector.add_bytes_read(bytes);
        }
        Some(content)
    }

    fn send(
        &mut self,
        response: Option<&ResponseHead>,
        last: bool,
        content: &[&[u8]],
    ) -> anyhow::Result<()> {
        if let Some(head) = response
            && self.collector.record_status(head.status).is_none()
        {
            debug!(status = head.status, "Response status outside 1xx-5xx");
        }

        let bytes: u64 = content.iter().map(|chunk| chunk.len() as u64).sum();
        if bytes > 0 {
            self.request.bytes_written.add(bytes);
            self.connection.add_bytes_written(bytes);
            self.collector.add_bytes_written(bytes);
        }

        self.inner.send(response, last, content)
    }
}

struct Completion {
    collector: StatisticsCollector,
    request_began: Instant,
    process_began: Instant,
}

impl Completion {
    fn complete(self) {
        self.collector
            .request_completed(self.request_began, self.process_began);
    }
}

/// Callback wrapper closing the request's statistics exactly once
///
/// Dropping it without a terminal signal counts as a cancelled request: the
/// statistics are closed and the wrapped callback is failed.
struct StatisticsCallback {
    pending: Option<(Box<dyn Callback>, Completion)>,
}

impl StatisticsCallback {
    fn finish(&mut self) -> Option<Box<dyn Callback>> {
        let (next, completion) = self.pending.take()?;
        completion.complete();
        Some(next)
    }
}

impl Callback for StatisticsCallback {
    fn succeeded(mut self: Box<Self>) {
        if let Some(next) = self.finish() {
            next.succeeded();
        }
    }

    fn failed(mut self: Box<Self>, error: anyhow::Error) {
        if let Some(next) = self.finish() {
            next.failed(error);
        }
    }
}

impl Drop for StatisticsCallback {
    fn drop(&mut self) {
        if let Some(next) = self.finish() {
            debug!("Request dropped before completion");
            next.failed(PipelineError::Cancelled.into());
        }
    }
}
