use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, monotonically increasing byte count
///
/// Clones observe the same count, so an attribute handed out early keeps
/// reflecting bytes transferred afterwards.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&self, bytes: u64) {
        self.0.fetch_add(bytes, Ordering::Relaxed);
    }

    #[must_use]
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl fmt::Display for ByteCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Value of a request attribute
#[derive(Debug, Clone)]
pub enum Attribute {
    Counter(ByteCounter),
    Text(String),
    Number(i64),
}

impl Attribute {
    /// Current value if this is a counter
    #[must_use]
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Counter(counter) => Some(counter.get()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_count() {
        let counter = ByteCounter::new();
        let attribute = Attribute::Counter(counter.clone());
        counter.add(600);
        counter.add(400);
        assert_eq!(attribute.as_count(), Some(1_000));
    }

    #[test]
    fn test_non_counter_has_no_count() {
        assert_eq!(Attribute::Number(3).as_count(), None);
        assert_eq!(Attribute::Text("x".into()).as_text(), Some("x"));
    }
}
