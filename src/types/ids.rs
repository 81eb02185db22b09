//! Process-unique identifiers
//!
//! Pools, entries and connections are identified by sequential numbers drawn
//! from per-type global counters. Identifiers are never reused within a
//! process.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! sequential_id {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident, prefix = $prefix:literal;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
        #[serde(transparent)]
        $vis struct $name(u64);

        impl $name {
            /// Allocate the next identifier
            #[must_use]
            pub fn next() -> Self {
                static NEXT: AtomicU64 = AtomicU64::new(1);
                Self(NEXT.fetch_add(1, Ordering::Relaxed))
            }

            /// Wrap a raw value, for transports with their own numbering
            #[must_use]
            #[inline]
            pub const fn from_raw(value: u64) -> Self {
                Self(value)
            }

            #[must_use]
            #[inline]
            pub const fn get(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

sequential_id! {
    /// Identity of one [`MultiplexConnectionPool`](crate::pool::MultiplexConnectionPool)
    pub struct PoolId, prefix = "pool";
}

sequential_id! {
    /// Identity of one pool entry; leases carry the id they were issued against
    pub struct EntryId, prefix = "entry";
}

sequential_id! {
    /// Identity of a transport connection, stable for its lifetime
    pub struct ConnectionId, prefix = "conn";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = EntryId::next();
        let b = EntryId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_display_prefix() {
        assert_eq!(ConnectionId::from_raw(7).to_string(), "conn-7");
        assert_eq!(PoolId::from_raw(2).to_string(), "pool-2");
        assert_eq!(EntryId::from_raw(3).to_string(), "entry-3");
    }
}
