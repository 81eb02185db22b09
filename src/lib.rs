//! Multiplexed connection pooling and request statistics
//!
//! Two independent building blocks for async network services:
//!
//! - [`pool`]: a [`MultiplexConnectionPool`] keeps a bounded set of
//!   connections to one destination, each carrying several concurrent
//!   requests, and provisions new connections on demand without blocking
//!   callers.
//! - [`metrics`]: a [`StatisticsHandler`] wraps a request
//!   [`Handler`](pipeline::Handler) and records request counts, timings,
//!   response classes and bytes transferred, per connection and overall.
//!
//! Both are lock-free on their hot paths and report through `tracing`.

#[macro_use]
mod test_macros;

pub mod config;
pub mod connection;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod statistic;
pub mod types;

#[doc(hidden)]
pub mod testing;

pub use config::{Config, PoolConfig, load_config, load_config_with_fallback};
pub use connection::{CloseNotifier, CloseSignal, ConnectionId};
pub use error::{InvariantViolation, PipelineError, PoolError};
pub use metrics::{StatisticsCollector, StatisticsHandler, StatisticsSnapshot};
pub use pool::{
    Acquire, Connection, ConnectionFactory, Lease, MaxMultiplexable, MultiplexConnectionPool,
    PoolStatus, Provisioning, Strategy,
};
pub use statistic::{CounterStatistic, SampleStatistic};
pub use types::{Destination, MaxConnections, MaxMultiplex};
