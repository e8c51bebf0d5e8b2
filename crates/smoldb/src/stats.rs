//! Store I/O statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counts file reads and writes performed by a store.
///
/// A read is one full decode of the backing file. A write is one full
/// rewrite, append or tombstone. Share a single instance between stores with
/// `Store::with_stats` to get totals across them.
#[derive(Debug, Default)]
pub struct Stats {
    reads: AtomicU64,
    writes: AtomicU64,
}

impl Stats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file read
    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a file write
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total reads
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Get total writes
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = Stats::new();
        stats.record_read();
        stats.record_write();
        stats.record_write();

        assert_eq!(stats.reads(), 1);
        assert_eq!(stats.writes(), 2);
    }

    #[test]
    fn test_reset() {
        let stats = Stats::new();
        stats.record_read();
        stats.record_write();
        stats.reset();

        assert_eq!(stats.reads(), 0);
        assert_eq!(stats.writes(), 0);
    }
}
