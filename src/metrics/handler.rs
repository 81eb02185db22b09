//! Request statistics middleware

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::collector::StatisticsCollector;
use super::connection_stats::ConnectionStatsRegistry;
use super::request::{StatisticsProcessor, StatisticsRequest};
use super::snapshot::StatisticsSnapshot;
use crate::pipeline::{Handler, Processor, Request};

/// Handler wrapper recording request, timing, response and byte statistics
///
/// Each accepted request is counted from handler entry until its callback
/// completes, or until its processor is dropped unused. A request the
/// wrapped handler rejects is closed immediately with a zero processing
/// sample, so every request adds one sample to each timing series.
///
/// ```ignore
/// let handler = StatisticsHandler::new(app);
/// dispatch(&handler, request, &mut stream, callback).await;
/// println!("{}", handler.snapshot().requests.total);
/// ```
pub struct StatisticsHandler<H> {
    next: H,
    collector: StatisticsCollector,
}

impl<H: Handler> StatisticsHandler<H> {
    pub fn new(next: H) -> Self {
        Self::with_collector(next, StatisticsCollector::new())
    }

    /// Record into an existing collector, shared with other handlers
    pub fn with_collector(next: H, collector: StatisticsCollector) -> Self {
        Self { next, collector }
    }

    #[must_use]
    pub fn next(&self) -> &H {
        &self.next
    }

    #[must_use]
    pub fn collector(&self) -> &StatisticsCollector {
        &self.collector
    }

    #[must_use]
    pub fn connections(&self) -> &ConnectionStatsRegistry {
        self.collector.connections()
    }

    #[must_use]
    pub fn snapshot(&self) -> StatisticsSnapshot {
        self.collector.snapshot()
    }

    pub fn reset(&self) {
        self.collector.reset();
    }
}

impl<H: Handler> Handler for StatisticsHandler<H> {
    fn handle(&self, request: Arc<dyn Request>) -> anyhow::Result<Box<dyn Processor>> {
        let handle_began = Instant::now();
        let connection = self.collector.connections().track(request.connection());
        connection.record_request();
        self.collector.request_started();

        let wrapped = Arc::new(StatisticsRequest::new(request));
        let result = self.next.handle(Arc::clone(&wrapped) as Arc<dyn Request>);
        self.collector.handling_finished(handle_began);

        match result {
            Ok(processor) => Ok(Box::new(StatisticsProcessor::new(
                processor,
                wrapped,
                connection,
                self.collector.clone(),
            ))),
            Err(e) => {
                self.collector.request_not_processed(wrapped.begin());
                debug!(connection = %connection.id(), error = %e, "Request rejected by handler");
                Err(e)
            }
        }
    }
}
