use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::CloseNotifier;
use crate::types::Destination;

/// Capability of a connection that knows its own concurrency limit
///
/// An HTTP/2 connection, for instance, learns `MAX_CONCURRENT_STREAMS` from
/// the peer's settings frame.
pub trait MaxMultiplexable {
    /// Concurrent requests the connection accepts; `0` is treated as unknown
    fn max_multiplex(&self) -> usize;
}

/// A pooled transport connection
///
/// The pool never mutates a connection. It queries the optional
/// [`MaxMultiplexable`] capability once after establishment and listens for
/// the close notification to drop the entry.
pub trait Connection: CloseNotifier + 'static {
    /// Typed capability query for a self-reported multiplex limit
    fn as_max_multiplexable(&self) -> Option<&dyn MaxMultiplexable> {
        None
    }
}

/// Establishes connections to a destination
///
/// Called from a spawned task; the pool applies no timeout and no retry.
#[async_trait]
pub trait ConnectionFactory<C: Connection>: Send + Sync {
    async fn connect(&self, destination: &Destination) -> anyhow::Result<C>;
}

#[async_trait]
impl<C, F> ConnectionFactory<C> for Arc<F>
where
    C: Connection,
    F: ConnectionFactory<C> + ?Sized,
{
    async fn connect(&self, destination: &Destination) -> anyhow::Result<C> {
        (**self).connect(destination).await
    }
}
