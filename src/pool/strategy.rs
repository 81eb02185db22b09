//! Entry selection strategies
//!
//! A strategy only chooses where the circular scan over the entry slots
//! starts. Every strategy then visits each slot once, so spare capacity is
//! always found when it exists.

use std::cell::Cell;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

thread_local! {
    static RNG_STATE: Cell<u64> = Cell::new({
        use std::time::SystemTime;
        let seed = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0x9E37_79B9_7F4A_7C15, |d| d.as_nanos() as u64);
        // xorshift state must be non-zero
        seed | 1
    });
}

/// Next value from the thread-local xorshift64* generator
#[inline]
fn next_random() -> u64 {
    RNG_STATE.with(|state| {
        let mut s = state.get();
        s ^= s >> 12;
        s ^= s << 25;
        s ^= s >> 27;
        state.set(s);
        s.wrapping_mul(0x2545_F491_4F6C_DD1D)
    })
}

/// Which entry an acquisition tries first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Lowest index with spare capacity wins; deterministic
    #[default]
    First,
    /// Start one slot further on each acquisition
    RoundRobin,
    /// Start at a random slot
    Random,
    /// Start at a slot derived from the calling thread
    ThreadId,
}

impl Strategy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::RoundRobin => "round_robin",
            Self::Random => "random",
            Self::ThreadId => "thread_id",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "first" => Ok(Self::First),
            "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            "thread_id" | "threadid" => Ok(Self::ThreadId),
            _ => Err(ValidationError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Strategy plus the state it needs
#[derive(Debug)]
pub struct Selector {
    strategy: Strategy,
    cursor: AtomicUsize,
}

impl Selector {
    #[must_use]
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            cursor: AtomicUsize::new(0),
        }
    }

    #[must_use]
    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Slot index the scan starts from, in `0..len`
    ///
    /// Returns 0 for an empty collection.
    pub fn start(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        match self.strategy {
            Strategy::First => 0,
            Strategy::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed) % len,
            Strategy::Random => (next_random() % len as u64) as usize,
            Strategy::ThreadId => {
                let mut hasher = DefaultHasher::new();
                std::thread::current().id().hash(&mut hasher);
                (hasher.finish() % len as u64) as usize
            }
        }
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(Strategy::default())
    }
}
