//! Multiplex capacity resolution
//!
//! Runs once per entry, right after the factory hands back a connection.

use std::fmt;

use tracing::warn;

use super::connection_trait::Connection;
use crate::types::MaxMultiplex;

/// Where an entry's capacity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacitySource {
    /// The connection reported its own limit
    Reported,
    /// The pool's initial max multiplex
    Default,
}

impl fmt::Display for CapacitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reported => "reported",
            Self::Default => "default",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCapacity {
    pub capacity: MaxMultiplex,
    pub source: CapacitySource,
}

/// Resolve the capacity of a freshly established connection
///
/// A reported value wins over `default`. A reported `0` is ignored with a
/// warning so capacity stays at least one.
pub fn resolve_capacity<C>(connection: &C, default: MaxMultiplex) -> ResolvedCapacity
where
    C: Connection + ?Sized,
{
    let Some(reporter) = connection.as_max_multiplexable() else {
        return ResolvedCapacity {
            capacity: default,
            source: CapacitySource::Default,
        };
    };

    match MaxMultiplex::new(reporter.max_multiplex()) {
        Some(capacity) => ResolvedCapacity {
            capacity,
            source: CapacitySource::Reported,
        },
        None => {
            warn!(
                connection = %connection.id(),
                default = %default,
                "Connection reported zero max multiplex, using default"
            );
            ResolvedCapacity {
                capacity: default,
                source: CapacitySource::Default,
            }
        }
    }
}
