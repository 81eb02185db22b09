//! Core value types
//!
//! Identifiers, validated configuration values and pool metric newtypes
//! shared by the pool and the statistics layer.

pub mod config;
pub mod destination;
pub mod ids;
pub mod pool;
pub mod validated;

pub use config::{MaxConnections, MaxMultiplex, Port};
pub use destination::Destination;
pub use ids::{ConnectionId, EntryId, PoolId};
pub use pool::{CreatedConnections, InUseLeases, PoolUtilization, SpareCapacity, TotalCapacity};
pub use validated::{HostName, SchemeName, ValidationError};
