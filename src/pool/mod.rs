//! Multiplexed connection pooling
//!
//! A [`MultiplexConnectionPool`] keeps up to `max_connections` entries for one
//! [`Destination`](crate::types::Destination). Each entry wraps one
//! connection and hands out up to its capacity of concurrent leases.
//!
//! - [`entry`]: the per-connection slot and its lock-free state word
//! - [`capacity`]: resolving an entry's capacity at activation
//! - [`strategy`]: where the acquisition scan starts
//! - [`multiplex`]: the pool, leases and provisioning handles

pub mod capacity;
mod connection_trait;
pub mod entry;
pub mod multiplex;
mod status;
pub mod strategy;

pub use capacity::{CapacitySource, ResolvedCapacity, resolve_capacity};
pub use connection_trait::{Connection, ConnectionFactory, MaxMultiplexable};
pub use entry::{EntryState, NoCapacity, PoolEntry};
pub use multiplex::{Acquire, Lease, MultiplexConnectionPool, PoolBuilder, Provisioning};
pub use status::{EntrySnapshot, PoolStatus};
pub use strategy::{Selector, Strategy};
