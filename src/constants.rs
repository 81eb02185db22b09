//! Constants used throughout the crate
//!
//! Centralizes attribute names, environment variable names and tuning
//! values so that callers and tests refer to one definition.

/// Request attribute names published by the statistics layer
pub mod attributes {
    /// Bytes of request content read so far, as [`Attribute::Counter`](crate::pipeline::Attribute::Counter)
    pub const BYTES_READ: &str = "muxpool.statistics.bytes_read";

    /// Bytes of response content written so far, as [`Attribute::Counter`](crate::pipeline::Attribute::Counter)
    pub const BYTES_WRITTEN: &str = "muxpool.statistics.bytes_written";
}

/// Statistic aggregator tuning
pub mod statistics {
    /// Number of cache-padded shards behind each sample statistic
    ///
    /// Threads are spread over the shards round-robin, so this bounds how
    /// many recorders can update one series without sharing a cache line.
    pub const SAMPLE_SHARDS: usize = 16;
}

/// Environment variables that override configuration file values
pub mod env {
    pub const MAX_CONNECTIONS: &str = "MUXPOOL_MAX_CONNECTIONS";

    pub const MAX_MULTIPLEX: &str = "MUXPOOL_MAX_MULTIPLEX";

    /// One of `first`, `round_robin`, `random`, `thread_id`
    pub const STRATEGY: &str = "MUXPOOL_STRATEGY";
}

/// Pool entry state word layout
///
/// One `u64` holds the entry state in its top two bits and the in-use count
/// in the rest, so state and count change together in a single CAS.
pub mod entry_word {
    pub const STATE_SHIFT: u32 = 62;

    pub const IN_USE_MASK: u64 = (1 << STATE_SHIFT) - 1;

    pub const PENDING: u64 = 0;

    pub const ACTIVE: u64 = 1 << STATE_SHIFT;

    pub const REMOVED: u64 = 2 << STATE_SHIFT;

    pub const STATE_MASK: u64 = !IN_USE_MASK;
}
