//! Store configuration

use std::time::Duration;

/// Default dead-space bound: compact once tombstones exceed a tenth of the entries.
pub const DEFAULT_COMPACTION_RATIO: u64 = 10;

/// Options for opening a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Time-to-live applied to every `set`; zero disables expiration
    pub ttl: Duration,

    /// A delete compacts instead of tombstoning when
    /// `tombstones * compaction_ratio > entries`
    pub compaction_ratio: u64,

    /// Call `fsync` after every write
    pub sync: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ttl: Duration::ZERO,
            compaction_ratio: DEFAULT_COMPACTION_RATIO,
            sync: true,
        }
    }
}

impl Options {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-key time-to-live
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the compaction ratio
    pub fn compaction_ratio(mut self, ratio: u64) -> Self {
        self.compaction_ratio = ratio;
        self
    }

    /// Enable or disable `fsync` after writes
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.ttl, Duration::ZERO);
        assert_eq!(options.compaction_ratio, 10);
        assert!(options.sync);
    }

    #[test]
    fn test_builder() {
        let options = Options::new()
            .ttl(Duration::from_secs(5))
            .compaction_ratio(4)
            .sync(false);
        assert_eq!(options.ttl, Duration::from_secs(5));
        assert_eq!(options.compaction_ratio, 4);
        assert!(!options.sync);
    }
}
