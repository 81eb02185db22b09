//! Request statistics instrumentation
//!
//! [`StatisticsHandler`] wraps a [`Handler`](crate::pipeline::Handler) and
//! records into a [`StatisticsCollector`]:
//!
//! - active and peak request, handling and processing counts
//! - request, handling and processing time series
//! - response counts by status class
//! - bytes read and written, globally, per request and per connection
//!
//! All recording is lock-free. Reading a [`StatisticsSnapshot`] while
//! requests are in flight gives each figure a consistent value, but the
//! figures are not taken at a single instant.

mod collector;
mod connection_stats;
mod handler;
mod request;
mod snapshot;
mod types;

pub use collector::StatisticsCollector;
pub use connection_stats::{ConnectionStats, ConnectionStatsRegistry, ConnectionSummary};
pub use handler::StatisticsHandler;
pub use request::StatisticsRequest;
pub use snapshot::{CounterSummary, StatisticsSnapshot, TimingSummary};
pub use types::{
    ByteCount, RequestCount, ResponseClassCounts, ResponseCount, ResponseCounters, StatusClass,
};
