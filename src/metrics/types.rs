//! Type-safe metrics types using the newtype pattern
//!
//! Counts in snapshots are wrapped so request counts, response counts and
//! byte counts cannot be mixed up.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Define a simple u64-based counter newtype with standard operations
macro_rules! counter_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[inline]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn get(self) -> u64 {
                self.0
            }

            #[inline]
            pub const fn saturating_sub(self, other: Self) -> Self {
                Self(self.0.saturating_sub(other.0))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

counter_type!(
    /// Responses in one status class
    ResponseCount
);
counter_type!(
    /// Bytes transferred in one direction
    ByteCount
);
counter_type!(
    /// Requests completed
    RequestCount
);

/// Response status class, `status / 100`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
}

impl StatusClass {
    pub const ALL: [Self; 5] = [
        Self::Informational,
        Self::Success,
        Self::Redirection,
        Self::ClientError,
        Self::ServerError,
    ];

    /// Classify a status code; codes outside 100..=599 have no class
    #[must_use]
    pub const fn from_status(status: u16) -> Option<Self> {
        match status / 100 {
            1 => Some(Self::Informational),
            2 => Some(Self::Success),
            3 => Some(Self::Redirection),
            4 => Some(Self::ClientError),
            5 => Some(Self::ServerError),
            _ => None,
        }
    }

    #[inline]
    const fn index(self) -> usize {
        match self {
            Self::Informational => 0,
            Self::Success => 1,
            Self::Redirection => 2,
            Self::ClientError => 3,
            Self::ServerError => 4,
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}xx", self.index() + 1)
    }
}

/// Lock-free per-class response counters
#[derive(Debug, Default)]
pub struct ResponseCounters {
    counts: [AtomicU64; 5],
}

impl ResponseCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a response status, returning its class if it has one
    pub fn record(&self, status: u16) -> Option<StatusClass> {
        let class = StatusClass::from_status(status)?;
        self.counts[class.index()].fetch_add(1, Ordering::Relaxed);
        Some(class)
    }

    #[must_use]
    pub fn get(&self, class: StatusClass) -> ResponseCount {
        ResponseCount::new(self.counts[class.index()].load(Ordering::Relaxed))
    }

    pub fn reset(&self) {
        for count in &self.counts {
            count.store(0, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ResponseClassCounts {
        ResponseClassCounts {
            informational: self.get(StatusClass::Informational),
            success: self.get(StatusClass::Success),
            redirection: self.get(StatusClass::Redirection),
            client_error: self.get(StatusClass::ClientError),
            server_error: self.get(StatusClass::ServerError),
        }
    }
}

/// Response counts by status class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResponseClassCounts {
    #[serde(rename = "1xx")]
    pub informational: ResponseCount,
    #[serde(rename = "2xx")]
    pub success: ResponseCount,
    #[serde(rename = "3xx")]
    pub redirection: ResponseCount,
    #[serde(rename = "4xx")]
    pub client_error: ResponseCount,
    #[serde(rename = "5xx")]
    pub server_error: ResponseCount,
}

impl ResponseClassCounts {
    #[must_use]
    pub fn get(&self, class: StatusClass) -> ResponseCount {
        match class {
            StatusClass::Informational => self.informational,
            StatusClass::Success => self.success,
            StatusClass::Redirection => self.redirection,
            StatusClass::ClientError => self.client_error,
            StatusClass::ServerError => self.server_error,
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        StatusClass::ALL.iter().map(|c| self.get(*c).get()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(StatusClass::from_status(100), Some(StatusClass::Informational));
        assert_eq!(StatusClass::from_status(204), Some(StatusClass::Success));
        assert_eq!(StatusClass::from_status(302), Some(StatusClass::Redirection));
        assert_eq!(StatusClass::from_status(404), Some(StatusClass::ClientError));
        assert_eq!(StatusClass::from_status(503), Some(StatusClass::ServerError));
    }

    #[test]
    fn test_out_of_range_has_no_class() {
        assert_eq!(StatusClass::from_status(0), None);
        assert_eq!(StatusClass::from_status(99), None);
        assert_eq!(StatusClass::from_status(600), None);
        assert_eq!(StatusClass::from_status(999), None);
    }

    #[test]
    fn test_record_increments_only_its_class() {
        let counters = ResponseCounters::new();
        assert_eq!(counters.record(204), Some(StatusClass::Success));
        assert_eq!(counters.record(503), Some(StatusClass::ServerError));
        assert_eq!(counters.record(700), None);

        let counts = counters.snapshot();
        assert_eq!(counts.success.get(), 1);
        assert_eq!(counts.server_error.get(), 1);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn test_reset() {
        let counters = ResponseCounters::new();
        counters.record(200);
        counters.reset();
        assert_eq!(counters.snapshot(), ResponseClassCounts::default());
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusClass::ClientError.to_string(), "4xx");
    }
}
