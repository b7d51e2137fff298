//! Block arithmetic of the recovery scan.

use super::UpkeepFilter;
use crate::RecovererConfig;
use rand::Rng;
use std::time::Duration;

/// Blocks the recoverer scans: old enough to be past reorgs and the regular log provider, recent
/// enough to bound the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecoveryWindow {
    pub(crate) start: u64,
    pub(crate) end: u64,
}

impl RecoveryWindow {
    /// Computes the window for the chain at `latest`, `None` while the chain is too short.
    pub(crate) fn new(latest: u64, block_time: Duration, config: &RecovererConfig) -> Option<Self> {
        let block_time_ms = block_time.as_millis().max(1);
        let lookback = u64::try_from(config.lookback_period.as_millis() / block_time_ms)
            .unwrap_or(u64::MAX);

        let end = latest.checked_sub(config.lookback_blocks + config.finality_depth)?;
        let start = latest.saturating_sub(lookback).min(end);
        Some(Self { start, end })
    }

    /// Returns `true` if `block` lies strictly inside the window.
    pub(crate) const fn contains_strict(&self, block: u64) -> bool {
        self.start < block && block < self.end
    }

    /// Returns the block range to scan for `filter` in this cycle.
    pub(crate) fn block_range(&self, filter: &UpkeepFilter, config: &RecovererConfig) -> (u64, u64) {
        let start = (filter.last_repoll_block + 1).max(filter.config_update_block).max(self.start);
        let mut end = start + config.logs_buffer;
        if self.end.saturating_sub(end) > 100 * config.logs_buffer {
            // lagging far behind, catch up faster
            end = start + config.logs_burst;
        }
        (start, end.min(self.end))
    }
}

/// Picks up to `batch_size` filters out of `filters`, sorted by ascending recovery cursor: the
/// first half are the most behind, the rest are drawn uniformly from the remainder.
pub(crate) fn select_filter_batch<R: Rng + ?Sized>(
    mut filters: Vec<UpkeepFilter>,
    batch_size: usize,
    rng: &mut R,
) -> Vec<UpkeepFilter> {
    if filters.len() < batch_size {
        return filters;
    }
    let mut remainder = filters.split_off(batch_size / 2);
    while filters.len() < batch_size && !remainder.is_empty() {
        let index = rng.random_range(0..remainder.len());
        filters.push(remainder.swap_remove(index));
    }
    filters
}
