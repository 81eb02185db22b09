//! Connection pool metric newtypes
//!
//! Type-safe wrappers for pool figures so that, for example, the number of
//! leases in use is never mixed up with the capacity it is measured against.

use std::fmt;

use serde::Serialize;

macro_rules! count_newtype {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        $vis struct $name(usize);

        impl $name {
            #[inline]
            #[must_use]
            pub const fn new(count: usize) -> Self {
                Self(count)
            }

            #[inline]
            #[must_use]
            pub const fn get(self) -> usize {
                self.0
            }

            #[inline]
            #[must_use]
            pub const fn zero() -> Self {
                Self(0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                Self(value)
            }
        }
    };
}

count_newtype! {
    /// Summed capacity of every active entry
    ///
    /// The upper bound on concurrent leases the pool can hand out without
    /// provisioning another connection.
    pub struct TotalCapacity;
}

count_newtype! {
    /// Number of leases currently held against the pool
    ///
    /// Never exceeds [`TotalCapacity`].
    pub struct InUseLeases;
}

count_newtype! {
    /// Units of capacity not currently leased
    pub struct SpareCapacity;
}

count_newtype! {
    /// Total number of entries created in the pool's lifetime
    ///
    /// Monotonically increasing. Compared with removals it shows connection
    /// churn.
    pub struct CreatedConnections;
}

impl SpareCapacity {
    /// Derive spare capacity from total capacity and leases in use
    #[inline]
    #[must_use]
    pub fn from_usage(capacity: TotalCapacity, in_use: InUseLeases) -> Self {
        Self(capacity.get().saturating_sub(in_use.get()))
    }
}

/// Pool utilization as a percentage (0-100)
///
/// Calculated as `in_use / capacity * 100` over active entries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PoolUtilization(f64);

impl PoolUtilization {
    /// Create a new pool utilization percentage
    ///
    /// # Panics
    /// Panics if percentage is not in range [0.0, 100.0]
    #[inline]
    #[must_use]
    pub fn new(percentage: f64) -> Self {
        assert!(
            (0.0..=100.0).contains(&percentage),
            "Utilization must be 0-100%, got {}",
            percentage
        );
        Self(percentage)
    }

    /// Calculate utilization from capacity and leases in use
    #[inline]
    #[must_use]
    pub fn from_usage(capacity: TotalCapacity, in_use: InUseLeases) -> Self {
        let capacity = capacity.get();
        if capacity == 0 {
            return Self(0.0);
        }
        let in_use = in_use.get().min(capacity);
        Self((in_use as f64 / capacity as f64) * 100.0)
    }

    #[inline]
    #[must_use]
    pub fn as_percentage(self) -> f64 {
        self.0
    }

    /// Check if every unit of capacity is leased
    #[inline]
    #[must_use]
    pub fn is_full(self) -> bool {
        self.0 >= 100.0
    }

    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0.0
    }

    /// Check if pool is under high load (>= 80%)
    #[inline]
    #[must_use]
    pub fn is_high_load(self) -> bool {
        self.0 >= 80.0
    }
}

impl fmt::Display for PoolUtilization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}
