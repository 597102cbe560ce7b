//! Rolling 24-hour volume buckets, one series per pool.
//!
//! Entries carry the block they came from so a reorg rollback can discard
//! exactly the orphaned trades. Eviction of aged entries happens lazily on
//! read, not by a background sweep.

use std::collections::VecDeque;

use alloy::primitives::U256;
use rustc_hash::FxHashMap;

const WINDOW_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
struct VolumeEntry {
    block: u64,
    timestamp: u64,
    usd: U256,
}

#[derive(Debug, Default)]
pub struct VolumeTracker {
    series: FxHashMap<String, VecDeque<VolumeEntry>>,
}

impl VolumeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a swap's USD trade size.
    pub fn record(&mut self, pool: &str, block: u64, timestamp: u64, usd: U256) {
        self.series
            .entry(pool.to_string())
            .or_default()
            .push_back(VolumeEntry {
                block,
                timestamp,
                usd,
            });
    }

    /// Sum of the trailing 24 hours as of `now`, evicting aged entries.
    pub fn volume_24h(&mut self, pool: &str, now: u64) -> U256 {
        let Some(entries) = self.series.get_mut(pool) else {
            return U256::ZERO;
        };
        let cutoff = now.saturating_sub(WINDOW_SECS);
        while entries.front().is_some_and(|e| e.timestamp < cutoff) {
            entries.pop_front();
        }
        entries
            .iter()
            .fold(U256::ZERO, |acc, e| acc.saturating_add(e.usd))
    }

    /// Discard trades recorded past the reorg ancestor.
    pub fn rollback_to(&mut self, ancestor: u64) {
        for entries in self.series.values_mut() {
            while entries.back().is_some_and(|e| e.block > ancestor) {
                entries.pop_back();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_within_window() {
        let mut tracker = VolumeTracker::new();
        tracker.record("0xa", 100, 1_000, U256::from(5u64));
        tracker.record("0xa", 110, 2_000, U256::from(7u64));
        assert_eq!(tracker.volume_24h("0xa", 2_000), U256::from(12u64));
    }

    #[test]
    fn evicts_lazily_on_read() {
        let mut tracker = VolumeTracker::new();
        tracker.record("0xa", 100, 1_000, U256::from(5u64));
        tracker.record("0xa", 200, 90_000, U256::from(7u64));
        // 1_000 is older than 24h before 90_000
        assert_eq!(tracker.volume_24h("0xa", 90_000), U256::from(7u64));
        // evicted for good, not just filtered
        assert_eq!(tracker.volume_24h("0xa", 1_000), U256::from(7u64));
    }

    #[test]
    fn rollback_drops_orphaned_trades() {
        let mut tracker = VolumeTracker::new();
        tracker.record("0xa", 100, 1_000, U256::from(5u64));
        tracker.record("0xa", 150, 1_500, U256::from(7u64));
        tracker.rollback_to(120);
        assert_eq!(tracker.volume_24h("0xa", 2_000), U256::from(5u64));
    }

    #[test]
    fn unknown_pool_is_zero() {
        let mut tracker = VolumeTracker::new();
        assert_eq!(tracker.volume_24h("0xmissing", 0), U256::ZERO);
    }
}
