use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide source of event identifiers.
///
/// Incremented exactly once per confirmed transition across all objects. Shared by `Arc`
/// so that isolated reactors can be built with independent counters.
#[derive(Debug)]
pub struct EventIdCounter {
    next: AtomicU64,
}

impl EventIdCounter {
    pub fn new(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Hands out the next identifier.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The identifier the next transition will receive.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for EventIdCounter {
    fn default() -> Self {
        Self::new(1)
    }
}
