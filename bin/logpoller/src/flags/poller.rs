//! Log poller arguments.

use clap::Args;
use logpoller_core::PollerConfig;
use std::time::Duration;

/// Tuning of the log poller.
#[derive(Args, Debug, Clone)]
pub(crate) struct PollerArgs {
    /// Interval between two polls, in milliseconds.
    #[arg(long = "poll.period", default_value_t = 3000, env = "LOGPOLLER_POLL_PERIOD")]
    pub(crate) poll_period_ms: u64,
    /// Number of finalized blocks fetched per request while backfilling.
    #[arg(long = "poll.backfill-batch-size", default_value_t = 1000, env = "LOGPOLLER_BACKFILL_BATCH_SIZE")]
    pub(crate) backfill_batch_size: u64,
    /// Block to start from on an empty database. Defaults to the finalized block.
    #[arg(long = "poll.start-block", env = "LOGPOLLER_START_BLOCK")]
    pub(crate) start_block: Option<u64>,
}

impl PollerArgs {
    pub(crate) const fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            poll_period: Duration::from_millis(self.poll_period_ms),
            backfill_batch_size: self.backfill_batch_size,
            start_block: self.start_block,
        }
    }
}
