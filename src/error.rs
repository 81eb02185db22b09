//! Error types for pool and pipeline operations
//!
//! Recoverable outcomes (an exhausted pool, a failed connection attempt) are
//! kept apart from [`InvariantViolation`]s, which indicate a caller bug and
//! are never clamped or retried.

use thiserror::Error;

use crate::types::{EntryId, PoolId};

/// Broken pool bookkeeping detected on release
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvariantViolation {
    /// Released more times than acquired; in-use would go negative
    #[error("double release on {entry}: in-use count is already zero")]
    DoubleRelease { entry: EntryId },

    /// Lease issued against another entry
    #[error("lease issued for {lease} released against {entry}")]
    WrongEntry { entry: EntryId, lease: EntryId },

    /// Lease issued by another pool
    #[error("lease from {lease_pool} released into {pool}")]
    WrongPool { pool: PoolId, lease_pool: PoolId },
}

/// Errors returned by [`MultiplexConnectionPool`](crate::pool::MultiplexConnectionPool)
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Max entry count reached and no entry has spare capacity
    #[error("connection pool exhausted for {destination} (max connections: {max_connections})")]
    Exhausted {
        destination: String,
        max_connections: usize,
    },

    /// The connection factory failed; the reserved slot has been released
    #[error("failed to establish connection to {destination}: {reason}")]
    ProvisioningFailed { destination: String, reason: String },

    /// The pool was closed while the operation was in progress
    #[error("connection pool for {destination} is closed")]
    Closed { destination: String },

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl PoolError {
    /// Whether retrying later can succeed
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Exhausted { .. } | Self::ProvisioningFailed { .. }
        )
    }

    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }

    /// Get the appropriate log level for this error
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        match self {
            // Back-pressure, expected under load
            Self::Exhausted { .. } => tracing::Level::DEBUG,
            Self::ProvisioningFailed { .. } => tracing::Level::WARN,
            Self::Closed { .. } => tracing::Level::INFO,
            Self::Invariant(_) => tracing::Level::ERROR,
        }
    }
}

/// Errors raised by the statistics layer on the request pipeline
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PipelineError {
    /// The completion callback was dropped without a terminal signal
    #[error("request abandoned before completion")]
    Cancelled,
}
