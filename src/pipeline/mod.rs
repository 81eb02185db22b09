//! Request processing pipeline boundary
//!
//! The statistics layer sits between a server's connection handling and the
//! application's request handling. These traits are the seam: a
//! [`Handler`] decides how to serve a [`Request`] and returns a
//! [`Processor`], which streams content through a [`Stream`] and reports
//! completion exactly once through a [`Callback`].

mod attribute;
mod content;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::connection::CloseNotifier;

pub use attribute::{Attribute, ByteCounter};
pub use content::{Content, ResponseHead};

/// An in-flight request
pub trait Request: Send + Sync {
    /// The connection the request arrived on
    fn connection(&self) -> &dyn CloseNotifier;

    /// When the request began
    fn begin(&self) -> Instant;

    /// Look up a named request attribute
    fn attribute(&self, name: &str) -> Option<Attribute>;
}

/// Bidirectional content stream of one request
pub trait Stream: Send {
    /// Next chunk of request content, `None` once exhausted
    fn read_content(&mut self) -> Option<Content>;

    /// Send response bytes, with the response head on the first send
    fn send(
        &mut self,
        response: Option<&ResponseHead>,
        last: bool,
        content: &[&[u8]],
    ) -> anyhow::Result<()>;
}

/// Completion signal of one request
///
/// Consuming `self` makes a second terminal signal impossible.
pub trait Callback: Send {
    fn succeeded(self: Box<Self>);

    fn failed(self: Box<Self>, error: anyhow::Error);
}

/// Decides how a request is served
pub trait Handler: Send + Sync {
    /// Returns the processor that will serve `request`; an error rejects it
    fn handle(&self, request: Arc<dyn Request>) -> anyhow::Result<Box<dyn Processor>>;
}

/// Serves one request
#[async_trait]
pub trait Processor: Send {
    /// Must eventually signal `callback` exactly once
    async fn process(
        self: Box<Self>,
        request: Arc<dyn Request>,
        stream: &mut dyn Stream,
        callback: Box<dyn Callback>,
    );
}

/// Run a request through `handler`, failing `callback` if it is rejected
pub async fn dispatch(
    handler: &dyn Handler,
    request: Arc<dyn Request>,
    stream: &mut dyn Stream,
    callback: Box<dyn Callback>,
) {
    match handler.handle(Arc::clone(&request)) {
        Ok(processor) => processor.process(request, stream, callback).await,
        Err(e) => callback.failed(e),
    }
}
