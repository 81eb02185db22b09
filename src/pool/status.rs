use serde::Serialize;

use super::entry::EntryState;
use crate::types::{
    CreatedConnections, EntryId, InUseLeases, MaxConnections, PoolUtilization, SpareCapacity,
    TotalCapacity,
};

/// Point-in-time pool status for monitoring
///
/// Entry figures come from one pass over the slots under the read lock;
/// lifetime totals come from the pool's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStatus {
    pub destination: String,
    pub max_connections: MaxConnections,
    /// Pending plus active entries
    pub live: usize,
    pub pending: usize,
    pub active: usize,
    /// Active entries with nothing leased
    pub idle: usize,
    pub in_use: InUseLeases,
    pub capacity: TotalCapacity,
    pub created: CreatedConnections,
    pub removed: u64,
    /// Highest number of live entries seen
    pub peak_live: usize,
    /// Highest number of simultaneous leases seen
    pub peak_in_use: usize,
    pub leases_total: u64,
    pub provision_failures: u64,
    pub exhausted: u64,
}

impl PoolStatus {
    #[must_use]
    pub fn spare(&self) -> SpareCapacity {
        SpareCapacity::from_usage(self.capacity, self.in_use)
    }

    #[must_use]
    pub fn utilization(&self) -> PoolUtilization {
        PoolUtilization::from_usage(self.capacity, self.in_use)
    }

    /// Whether another entry may still be provisioned
    #[must_use]
    pub fn can_grow(&self) -> bool {
        self.live < self.max_connections.get()
    }
}

/// Snapshot of one occupied slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntrySnapshot {
    pub id: EntryId,
    #[serde(serialize_with = "serialize_state")]
    pub state: EntryState,
    pub in_use: usize,
    /// `None` while pending
    pub capacity: Option<usize>,
}

fn serialize_state<S: serde::Serializer>(state: &EntryState, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(state)
}
