//! In-memory connections, factories and pipeline stages for tests
//!
//! Not part of the stable API.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::connection::{CloseListener, CloseNotifier, CloseSignal, ConnectionId};
use crate::pipeline::{
    Attribute, Callback, Content, Handler, Processor, Request, ResponseHead, Stream,
};
use crate::pool::{Connection, ConnectionFactory, MaxMultiplexable};
use crate::types::Destination;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connection that closes when told to
#[derive(Debug, Clone)]
pub struct MockConnection {
    signal: Arc<CloseSignal>,
    max_multiplex: Option<usize>,
}

impl MockConnection {
    /// Connection that does not report a multiplex limit
    #[must_use]
    pub fn new() -> Self {
        Self {
            signal: Arc::new(CloseSignal::new(ConnectionId::next())),
            max_multiplex: None,
        }
    }

    /// Connection reporting `max_multiplex` concurrent requests
    #[must_use]
    pub fn with_max_multiplex(max_multiplex: usize) -> Self {
        Self {
            max_multiplex: Some(max_multiplex),
            ..Self::new()
        }
    }

    #[must_use]
    pub fn signal(&self) -> &Arc<CloseSignal> {
        &self.signal
    }

    pub fn close(&self) -> bool {
        self.signal.close()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl CloseNotifier for MockConnection {
    fn id(&self) -> ConnectionId {
        self.signal.id()
    }

    fn on_close(&self, listener: CloseListener) {
        self.signal.register(listener);
    }
}

impl MaxMultiplexable for MockConnection {
    fn max_multiplex(&self) -> usize {
        self.max_multiplex.unwrap_or(0)
    }
}

impl Connection for MockConnection {
    fn as_max_multiplexable(&self) -> Option<&dyn MaxMultiplexable> {
        self.max_multiplex.map(|_| self as &dyn MaxMultiplexable)
    }
}

#[derive(Debug)]
struct FactoryInner {
    max_multiplex: Mutex<Option<usize>>,
    failures: AtomicUsize,
    gated: AtomicBool,
    gate: Semaphore,
    connects: AtomicUsize,
    opened: Mutex<Vec<Arc<CloseSignal>>>,
}

/// Scriptable [`ConnectionFactory`] for [`MockConnection`]s
///
/// Clones share the script and the record of opened connections.
#[derive(Debug, Clone)]
pub struct MockFactory {
    inner: Arc<FactoryInner>,
}

impl Default for MockFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFactory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                max_multiplex: Mutex::new(None),
                failures: AtomicUsize::new(0),
                gated: AtomicBool::new(false),
                gate: Semaphore::new(0),
                connects: AtomicUsize::new(0),
                opened: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Connections report `max_multiplex`
    #[must_use]
    pub fn with_max_multiplex(self, max_multiplex: usize) -> Self {
        *lock(&self.inner.max_multiplex) = Some(max_multiplex);
        self
    }

    /// The next `attempts` connects fail
    #[must_use]
    pub fn failing_first(self, attempts: usize) -> Self {
        self.inner.failures.store(attempts, Ordering::SeqCst);
        self
    }

    /// Connects wait until [`open_gate`](Self::open_gate) admits them
    #[must_use]
    pub fn gated(self) -> Self {
        self.inner.gated.store(true, Ordering::SeqCst);
        self
    }

    /// Let `connects` waiting or future connects proceed
    pub fn open_gate(&self, connects: usize) {
        self.inner.gate.add_permits(connects);
    }

    /// Connect attempts started so far
    #[must_use]
    pub fn connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Close signals of every connection opened so far, in order
    #[must_use]
    pub fn opened(&self) -> Vec<Arc<CloseSignal>> {
        lock(&self.inner.opened).clone()
    }

    /// Close every connection opened so far
    pub fn close_all(&self) -> usize {
        self.opened()
            .iter()
            .filter(|signal| signal.close())
            .count()
    }
}

#[async_trait]
impl ConnectionFactory<MockConnection> for MockFactory {
    async fn connect(&self, _destination: &Destination) -> anyhow::Result<MockConnection> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        if self.inner.gated.load(Ordering::SeqCst) {
            self.inner.gate.acquire().await?.forget();
        }

        if self
            .inner
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            anyhow::bail!("connection refused");
        }

        let max_multiplex = *lock(&self.inner.max_multiplex);
        let connection = match max_multiplex {
            Some(n) => MockConnection::with_max_multiplex(n),
            None => MockConnection::new(),
        };
        lock(&self.inner.opened).push(Arc::clone(connection.signal()));
        Ok(connection)
    }
}

/// Request on an in-memory connection
pub struct TestRequest {
    connection: Arc<CloseSignal>,
    begin: Instant,
    attributes: HashMap<String, Attribute>,
}

impl TestRequest {
    /// Request on a fresh connection of its own
    #[must_use]
    pub fn new() -> Self {
        Self::on(Arc::new(CloseSignal::new(ConnectionId::next())))
    }

    /// Request on an existing connection
    #[must_use]
    pub fn on(connection: Arc<CloseSignal>) -> Self {
        Self {
            connection,
            begin: Instant::now(),
            attributes: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: Attribute) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }
}

impl Default for TestRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl Request for TestRequest {
    fn connection(&self) -> &dyn CloseNotifier {
        self.connection.as_ref()
    }

    fn begin(&self) -> Instant {
        self.begin
    }

    fn attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes.get(name).cloned()
    }
}

/// Stream serving scripted request chunks and recording what is sent
#[derive(Debug, Default)]
pub struct TestStream {
    chunks: VecDeque<Content>,
    sent: Vec<u8>,
    statuses: Vec<u16>,
    fail_sends: bool,
}

impl TestStream {
    /// Stream whose request content is `chunks`, the final one marked last
    #[must_use]
    pub fn with_chunks(chunks: Vec<Vec<u8>>) -> Self {
        let count = chunks.len();
        let chunks = chunks
            .into_iter()
            .enumerate()
            .map(|(i, data)| Content::new(data, i + 1 == count))
            .collect();
        Self {
            chunks,
            ..Self::default()
        }
    }

    /// Every send fails after being offered
    #[must_use]
    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    #[must_use]
    pub fn sent_bytes(&self) -> usize {
        self.sent.len()
    }

    #[must_use]
    pub fn statuses(&self) -> &[u16] {
        &self.statuses
    }
}

impl Stream for TestStream {
    fn read_content(&mut self) -> Option<Content> {
        self.chunks.pop_front()
    }

    fn send(
        &mut self,
        response: Option<&ResponseHead>,
        _last: bool,
        content: &[&[u8]],
    ) -> anyhow::Result<()> {
        if self.fail_sends {
            anyhow::bail!("broken pipe");
        }
        if let Some(head) = response {
            self.statuses.push(head.status);
        }
        for chunk in content {
            self.sent.extend_from_slice(chunk);
        }
        Ok(())
    }
}

#[derive(Debug)]
enum Signal {
    Succeeded,
    Failed(String),
}

/// Observer of a [`RecordingCallback`]
#[derive(Debug, Clone, Default)]
pub struct CallbackOutcome {
    signals: Arc<Mutex<Vec<Signal>>>,
}

impl CallbackOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(lock(&self.signals).first(), Some(Signal::Succeeded))
    }

    /// Error message of the first terminal signal, if it was a failure
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        match lock(&self.signals).first() {
            Some(Signal::Failed(message)) => Some(message.clone()),
            _ => None,
        }
    }

    /// Terminal signals received
    #[must_use]
    pub fn signals(&self) -> usize {
        lock(&self.signals).len()
    }
}

/// Callback recording how the request ended
pub struct RecordingCallback {
    outcome: CallbackOutcome,
}

impl RecordingCallback {
    #[must_use]
    pub fn new() -> (Self, CallbackOutcome) {
        let outcome = CallbackOutcome::default();
        (
            Self {
                outcome: outcome.clone(),
            },
            outcome,
        )
    }
}

impl Callback for RecordingCallback {
    fn succeeded(self: Box<Self>) {
        lock(&self.outcome.signals).push(Signal::Succeeded);
    }

    fn failed(self: Box<Self>, error: anyhow::Error) {
        lock(&self.outcome.signals).push(Signal::Failed(error.to_string()));
    }
}

/// Reads all request content, then writes a response of fixed size
///
/// With no response size set the request content is echoed back.
#[derive(Debug, Clone)]
pub struct EchoHandler {
    status: u16,
    response_size: Option<usize>,
    gate: Option<Arc<Semaphore>>,
}

impl EchoHandler {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            response_size: None,
            gate: None,
        }
    }

    /// Respond with `bytes` bytes instead of echoing
    #[must_use]
    pub fn responding(mut self, bytes: usize) -> Self {
        self.response_size = Some(bytes);
        self
    }

    /// Hold each request until `gate` grants it a permit
    #[must_use]
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

impl Handler for EchoHandler {
    fn handle(&self, _request: Arc<dyn Request>) -> anyhow::Result<Box<dyn Processor>> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl Processor for EchoHandler {
    async fn process(
        self: Box<Self>,
        _request: Arc<dyn Request>,
        stream: &mut dyn Stream,
        callback: Box<dyn Callback>,
    ) {
        let mut body = Vec::new();
        while let Some(content) = stream.read_content() {
            body.extend_from_slice(&content.data);
        }

        if let Some(gate) = &self.gate {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(e) => return callback.failed(e.into()),
            }
        }

        if let Some(size) = self.response_size {
            body = vec![0; size];
        }
        let head = ResponseHead::new(self.status);
        match stream.send(Some(&head), true, &[body.as_slice()]) {
            Ok(()) => callback.succeeded(),
            Err(e) => callback.failed(e),
        }
    }
}

/// Rejects every request with a fixed message
#[derive(Debug, Clone)]
pub struct RejectingHandler {
    message: &'static str,
}

impl RejectingHandler {
    #[must_use]
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

impl Handler for RejectingHandler {
    fn handle(&self, _request: Arc<dyn Request>) -> anyhow::Result<Box<dyn Processor>> {
        Err(anyhow::anyhow!(self.message))
    }
}

/// Accepts requests, then drops the callback without signalling
#[derive(Debug, Clone, Default)]
pub struct AbandoningHandler;

impl Handler for AbandoningHandler {
    fn handle(&self, _request: Arc<dyn Request>) -> anyhow::Result<Box<dyn Processor>> {
        Ok(Box::new(Self))
    }
}

#[async_trait]
impl Processor for AbandoningHandler {
    async fn process(
        self: Box<Self>,
        _request: Arc<dyn Request>,
        stream: &mut dyn Stream,
        callback: Box<dyn Callback>,
    ) {
        let _ = stream.read_content();
        drop(callback);
    }
}
