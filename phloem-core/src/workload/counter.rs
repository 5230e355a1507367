//! Shared insertion counter

use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out insert indices exactly once across all workers
///
/// `issued()` doubles as the high-water mark of the keyspace: every index below it
/// has been handed to some inserter, which is what read-style operations and the
/// "latest" distribution select from. An index counts as issued when it is drawn,
/// not when the backend acknowledges the insert, so a read may race the insert of
/// its own key and observe NOT_FOUND.
#[derive(Debug)]
pub struct InsertCounter {
    next: AtomicU64,
    end: Option<u64>,
}

impl InsertCounter {
    /// Unbounded counter whose first index is `start`
    pub fn new(start: u64) -> Self {
        Self { next: AtomicU64::new(start), end: None }
    }

    /// Counter that issues `count` indices starting at `start`
    pub fn with_limit(start: u64, count: u64) -> Self {
        Self { next: AtomicU64::new(start), end: Some(start.saturating_add(count)) }
    }

    /// Claim the next index, or `None` once the limit is reached
    pub fn next_index(&self) -> Option<u64> {
        let index = self.next.fetch_add(1, Ordering::AcqRel);
        match self.end {
            Some(end) if index >= end => None,
            _ => Some(index),
        }
    }

    /// One past the highest index issued so far
    pub fn issued(&self) -> u64 {
        let next = self.next.load(Ordering::Acquire);
        match self.end {
            Some(end) => next.min(end),
            None => next,
        }
    }

    /// Whether a bounded counter has issued everything it owns
    pub fn is_exhausted(&self) -> bool {
        matches!(self.end, Some(end) if self.next.load(Ordering::Acquire) >= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_unbounded_counter() {
        let counter = InsertCounter::new(10);
        assert_eq!(counter.issued(), 10);
        assert_eq!(counter.next_index(), Some(10));
        assert_eq!(counter.next_index(), Some(11));
        assert_eq!(counter.issued(), 12);
        assert!(!counter.is_exhausted());
    }

    #[test]
    fn test_bounded_counter() {
        let counter = InsertCounter::with_limit(5, 2);
        assert_eq!(counter.next_index(), Some(5));
        assert_eq!(counter.next_index(), Some(6));
        assert_eq!(counter.next_index(), None);
        assert_eq!(counter.next_index(), None);
        assert_eq!(counter.issued(), 7);
        assert!(counter.is_exhausted());
    }

    #[test]
    fn test_concurrent_indices_are_unique() {
        let counter = Arc::new(InsertCounter::with_limit(0, 8_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    let mut claimed = Vec::new();
                    while let Some(index) = counter.next_index() {
                        claimed.push(index);
                    }
                    claimed
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for index in handle.join().unwrap() {
                assert!(all.insert(index), "index {index} issued twice");
            }
        }
        assert_eq!(all.len(), 8_000);
        assert_eq!(counter.issued(), 8_000);
    }
}
