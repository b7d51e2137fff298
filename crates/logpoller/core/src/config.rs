//! Runtime configuration of the poller, its chain client and the recoverer.

use std::time::Duration;

/// Default bound on a single RPC round-trip.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration of an [`AlloyChainClient`](crate::AlloyChainClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bound on every RPC round-trip.
    pub rpc_timeout: Duration,
    /// Whether the node supports the `finalized` block tag.
    pub use_finality_tag: bool,
    /// Depth at which blocks are considered final when the `finalized` tag is not used.
    pub finality_depth: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { rpc_timeout: DEFAULT_RPC_TIMEOUT, use_finality_tag: true, finality_depth: 50 }
    }
}

/// Configuration of a [`LogPoller`](crate::LogPoller).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Interval between two poll ticks.
    pub poll_period: Duration,
    /// Number of finalized blocks fetched per `eth_getLogs` range during backfill.
    pub backfill_batch_size: u64,
    /// Block to start from on an empty store. Defaults to the remote finalized block.
    pub start_block: Option<u64>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { poll_period: Duration::from_secs(3), backfill_batch_size: 1000, start_block: None }
    }
}

/// Configuration of a [`LogRecoverer`](crate::LogRecoverer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecovererConfig {
    /// Interval between two recovery scans.
    pub recovery_interval: Duration,
    /// How long a queued payload is kept before `clean` reconsiders it.
    pub cache_ttl: Duration,
    /// Upper bound on the payloads returned by one `get_recovery_proposals` call.
    pub max_proposals: usize,
    /// Upper bound on the payloads of a single upkeep returned by one call.
    pub allowed_logs_per_upkeep: usize,
    /// Number of filters scanned per recovery cycle.
    pub recovery_batch_size: usize,
    /// Number of blocks scanned per filter and cycle.
    pub logs_buffer: u64,
    /// Number of blocks scanned per filter and cycle while lagging behind.
    pub logs_burst: u64,
    /// Interval between two block time estimations.
    pub block_time_update_cadence: Duration,
    /// Cap on the pending payloads of a single upkeep.
    pub max_pending_payloads_per_upkeep: usize,
    /// How far back in time the recovery window reaches.
    pub lookback_period: Duration,
    /// Number of recent blocks left to the regular log provider.
    pub lookback_blocks: u64,
    /// Depth after which performed upkeeps are final.
    pub finality_depth: u64,
    /// Block time assumed until the first estimation completes.
    pub default_block_time: Duration,
    /// Number of recent blocks the block time is estimated from.
    pub block_time_sample_size: u64,
}

impl RecovererConfig {
    /// Interval of the cleanup loop, one second short of the cache TTL.
    pub fn gc_interval(&self) -> Duration {
        self.cache_ttl.saturating_sub(Duration::from_secs(1)).max(Duration::from_millis(1))
    }
}

impl Default for RecovererConfig {
    fn default() -> Self {
        Self {
            recovery_interval: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(10 * 60),
            max_proposals: 20,
            allowed_logs_per_upkeep: 5,
            recovery_batch_size: 100,
            logs_buffer: 200,
            logs_burst: 500,
            block_time_update_cadence: Duration::from_secs(10 * 60),
            max_pending_payloads_per_upkeep: 500,
            lookback_period: Duration::from_secs(24 * 60 * 60),
            lookback_blocks: 100,
            finality_depth: 50,
            default_block_time: Duration::from_secs(1),
            block_time_sample_size: 200,
        }
    }
}
