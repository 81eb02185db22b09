//! Default values for configuration fields
//!
//! Used by serde deserialization and by the `Default` impls.

use crate::pool::Strategy;
use crate::types::{HostName, MaxConnections, MaxMultiplex, SchemeName};

#[inline]
pub fn scheme() -> SchemeName {
    SchemeName::http()
}

#[inline]
pub fn host() -> HostName {
    HostName::default()
}

/// Default maximum entries per pool
#[inline]
pub fn max_connections() -> MaxConnections {
    MaxConnections::DEFAULT
}

/// Default capacity for connections that report none
#[inline]
pub fn max_multiplex() -> MaxMultiplex {
    MaxMultiplex::DEFAULT
}

#[inline]
pub fn strategy() -> Strategy {
    Strategy::First
}

/// Compact the slot vector on removal by default
#[inline]
pub fn cache() -> bool {
    false
}

/// Keep idle connections by default
#[inline]
pub fn retain_idle() -> bool {
    true
}
