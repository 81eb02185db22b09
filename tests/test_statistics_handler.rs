//! Tests for metrics/handler.rs
//!
//! Requests dispatched through a `StatisticsHandler` against in-memory
//! streams and callbacks.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use muxpool::connection::{CloseSignal, ConnectionId};
use muxpool::constants::attributes;
use muxpool::metrics::{StatisticsCollector, StatisticsHandler, StatusClass};
use muxpool::pipeline::{
    Attribute, Callback, Handler, Processor, Request, ResponseHead, Stream, dispatch,
};
use muxpool::testing::{
    AbandoningHandler, EchoHandler, RecordingCallback, RejectingHandler, TestRequest, TestStream,
};
use tokio::sync::Semaphore;

async fn run<H: Handler>(handler: &H, request: TestRequest, mut stream: TestStream) -> String {
    let (callback, outcome) = RecordingCallback::new();
    dispatch(handler, Arc::new(request), &mut stream, Box::new(callback)).await;
    assert_eq!(outcome.signals(), 1, "exactly one terminal signal");
    outcome.failure().unwrap_or_else(|| "ok".to_string())
}

#[tokio::test]
async fn test_status_classes() {
    let ok = StatisticsHandler::new(EchoHandler::new(204));
    run(&ok, TestRequest::new(), TestStream::default()).await;
    let responses = ok.snapshot().responses;
    assert_eq!(responses.success.get(), 1);
    assert_eq!(responses.total(), 1);

    let unavailable = StatisticsHandler::new(EchoHandler::new(503));
    run(&unavailable, TestRequest::new(), TestStream::default()).await;
    let responses = unavailable.snapshot().responses;
    assert_eq!(responses.get(StatusClass::ServerError).get(), 1);
    assert_eq!(responses.total(), 1);

    for status in [99, 600, 0] {
        let odd = StatisticsHandler::new(EchoHandler::new(status));
        run(&odd, TestRequest::new(), TestStream::default()).await;
        assert_eq!(odd.snapshot().responses.total(), 0, "status {status}");
    }
}

#[tokio::test]
async fn test_success_and_failure_restore_active_requests() {
    let handler = StatisticsHandler::new(EchoHandler::new(200));
    assert_eq!(run(&handler, TestRequest::new(), TestStream::default()).await, "ok");

    let failing = TestStream::with_chunks(vec![vec![7; 3]]).failing_sends();
    assert_eq!(run(&handler, TestRequest::new(), failing).await, "broken pipe");

    let snapshot = handler.snapshot();
    assert_eq!(snapshot.requests.current, 0);
    assert_eq!(snapshot.requests.total, 2);
    assert_eq!(snapshot.processings.current, 0);
    assert_eq!(snapshot.request_time.count, 2);
    assert_eq!(snapshot.handling_time.count, 2);
    assert_eq!(snapshot.processing_time.count, 2);
    // Bytes offered to a failing send are still counted
    assert_eq!(snapshot.bytes_written.get(), 3);
}

#[tokio::test]
async fn test_rejected_request() {
    let handler = StatisticsHandler::new(RejectingHandler::new("forbidden"));

    assert_eq!(run(&handler, TestRequest::new(), TestStream::default()).await, "forbidden");

    let snapshot = handler.snapshot();
    assert_eq!(snapshot.requests.current, 0);
    assert_eq!(snapshot.requests.total, 1);
    assert_eq!(snapshot.handlings.current, 0);
    assert_eq!(snapshot.request_time.count, 1);
    assert_eq!(snapshot.handling_time.count, 1);
    assert_eq!(snapshot.processing_time.count, 1);
    assert_eq!(snapshot.processing_time.max_nanos, 0);
    assert_eq!(snapshot.processings.total, 0);
    assert_eq!(snapshot.responses.total(), 0);
}

/// A processor thrown away before it runs still closes its request
#[tokio::test]
async fn test_dropped_processor_restores_active_requests() {
    let handler = StatisticsHandler::new(EchoHandler::new(200));

    for _ in 0..3 {
        let processor = handler.handle(Arc::new(TestRequest::new())).unwrap();
        drop(processor);
    }
    run(&handler, TestRequest::new(), TestStream::default()).await;

    let snapshot = handler.snapshot();
    assert_eq!(snapshot.requests.current, 0);
    assert_eq!(snapshot.requests.total, 4);
    assert_eq!(snapshot.request_time.count, 4);
    assert_eq!(snapshot.handling_time.count, 4);
    assert_eq!(snapshot.processing_time.count, 4);
    assert_eq!(snapshot.processings.total, 1);
}

#[tokio::test]
async fn test_abandoned_request_fails_once() {
    let handler = StatisticsHandler::new(AbandoningHandler);

    let failure = run(&handler, TestRequest::new(), TestStream::default()).await;

    assert!(failure.contains("abandoned"), "{failure}");
    let snapshot = handler.snapshot();
    assert_eq!(snapshot.requests.current, 0);
    assert_eq!(snapshot.processings.current, 0);
    assert_eq!(snapshot.processing_time.count, 1);
    assert_eq!(snapshot.request_time.count, 1);
}

#[tokio::test]
async fn test_in_flight_counts() {
    let gate = Arc::new(Semaphore::new(0));
    let handler = Arc::new(StatisticsHandler::new(
        EchoHandler::new(200).gated(Arc::clone(&gate)),
    ));

    let task = {
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            run(handler.as_ref(), TestRequest::new(), TestStream::default()).await
        })
    };

    while handler.collector().processings().current() == 0 {
        tokio::task::yield_now().await;
    }
    let snapshot = handler.snapshot();
    assert_eq!(snapshot.requests.current, 1);
    assert_eq!(snapshot.handlings.current, 0);
    assert_eq!(snapshot.processings.current, 1);

    gate.add_permits(1);
    assert_eq!(task.await.unwrap(), "ok");

    let snapshot = handler.snapshot();
    assert_eq!(snapshot.requests.current, 0);
    assert_eq!(snapshot.requests.max, 1);
    assert_eq!(snapshot.processings.max, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_requests_on_one_connection() {
    let handler = Arc::new(StatisticsHandler::new(EchoHandler::new(200).responding(400)));
    let connection = Arc::new(CloseSignal::new(ConnectionId::next()));

    let tasks: Vec<_> = (0..100)
        .map(|_| {
            let handler = Arc::clone(&handler);
            let connection = Arc::clone(&connection);
            tokio::spawn(async move {
                let stream = TestStream::with_chunks(vec![vec![1; 200], vec![2; 250], vec![3; 150]]);
                run(handler.as_ref(), TestRequest::on(connection), stream).await
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap(), "ok");
    }

    let stats = handler
        .connections()
        .get(connection.id())
        .expect("connection tracked");
    assert_eq!(stats.requests().get(), 100);
    assert_eq!(stats.bytes_read().get(), 60_000);
    assert_eq!(stats.bytes_written().get(), 40_000);

    let snapshot = handler.snapshot();
    assert_eq!(snapshot.bytes_read.get(), 60_000);
    assert_eq!(snapshot.bytes_written.get(), 40_000);
    assert_eq!(snapshot.requests.total, 100);
    assert_eq!(snapshot.requests.current, 0);
    assert_eq!(snapshot.responses.success.get(), 100);
    assert_eq!(snapshot.connections.open, 1);

    assert!(connection.close());
    let summary = handler.connections().summary();
    assert_eq!(summary.open, 0);
    assert_eq!(summary.closed_requests.get(), 100);
    assert_eq!(summary.closed_bytes_read.get(), 60_000);
    assert_eq!(summary.closed_bytes_written.get(), 40_000);
    assert_eq!(summary.duration.count, 1);
}

/// Records the byte-count attributes seen after responding
#[derive(Clone, Default)]
struct AttributeRecorder {
    seen: Arc<Mutex<Vec<(Option<u64>, Option<u64>, Option<String>)>>>,
}

impl Handler for AttributeRecorder {
    fn handle(&self, _request: Arc<dyn Request>) -> anyhow::Result<Box<dyn Processor>> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl Processor for AttributeRecorder {
    async fn process(
        self: Box<Self>,
        request: Arc<dyn Request>,
        stream: &mut dyn Stream,
        callback: Box<dyn Callback>,
    ) {
        while stream.read_content().is_some() {}
        let head = ResponseHead::new(200);
        if let Err(e) = stream.send(Some(&head), false, &[b"hello".as_slice()]) {
            return callback.failed(e);
        }
        if let Err(e) = stream.send(None, true, &[b" ".as_slice(), b"world".as_slice()]) {
            return callback.failed(e);
        }

        let read = request
            .attribute(attributes::BYTES_READ)
            .and_then(|a| a.as_count());
        let written = request
            .attribute(attributes::BYTES_WRITTEN)
            .and_then(|a| a.as_count());
        let user = request
            .attribute("user")
            .and_then(|a| a.as_text().map(str::to_string));
        self.seen.lock().unwrap().push((read, written, user));
        callback.succeeded();
    }
}

#[tokio::test]
async fn test_byte_count_attributes() {
    let recorder = AttributeRecorder::default();
    let handler = StatisticsHandler::new(recorder.clone());
    let request = TestRequest::new().with_attribute("user", Attribute::Text("ada".into()));

    let stream = TestStream::with_chunks(vec![vec![0; 12], vec![0; 30]]);
    assert_eq!(run(&handler, request, stream).await, "ok");

    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen.as_slice(), &[(Some(42), Some(11), Some("ada".to_string()))]);
    // Only the first send carried a status
    assert_eq!(handler.snapshot().responses.total(), 1);
}

#[tokio::test]
async fn test_reset_zeroes_series() {
    let handler = StatisticsHandler::new(EchoHandler::new(404));
    run(&handler, TestRequest::new(), TestStream::with_chunks(vec![vec![0; 8]])).await;

    handler.reset();

    let snapshot = handler.snapshot();
    assert_eq!(snapshot.requests.total, 0);
    assert_eq!(snapshot.request_time.count, 0);
    assert_eq!(snapshot.responses.client_error.get(), 0);
    assert_eq!(snapshot.bytes_read.get(), 0);
}

#[tokio::test]
async fn test_shared_collector_aggregates_handlers() {
    let collector = StatisticsCollector::new();
    let ok = StatisticsHandler::with_collector(EchoHandler::new(200), collector.clone());
    let failing = StatisticsHandler::with_collector(EchoHandler::new(500), collector.clone());

    run(&ok, TestRequest::new(), TestStream::default()).await;
    run(&failing, TestRequest::new(), TestStream::default()).await;

    let snapshot = collector.snapshot();
    assert_eq!(snapshot.requests.total, 2);
    assert_eq!(snapshot.responses.success.get(), 1);
    assert_eq!(snapshot.responses.server_error.get(), 1);
    assert_eq!(snapshot.error_rate_percent(), 50.0);
}
