//! Prune Subcommand.

use crate::flags::GlobalArgs;
use anyhow::{Context as _, Result};
use clap::Parser;
use logpoller_storage::{BlockStorageReader, RetentionStorage};
use tracing::info;

/// The `prune` Subcommand
///
/// Deletes blocks older than `--keep-blocks` below the latest finalized block, then the logs
/// whose filter retention expired. Meant to be run periodically, e.g. from cron.
#[derive(Parser, Debug, Clone)]
#[command(about = "Deletes old blocks and expired logs")]
pub(crate) struct PruneCommand {
    /// Number of finalized blocks to keep.
    #[arg(long, default_value_t = 10_000)]
    pub(crate) keep_blocks: u64,
    /// Maximum number of rows deleted per table. Zero removes everything eligible.
    #[arg(long, default_value_t = 0)]
    pub(crate) limit: usize,
}

impl PruneCommand {
    pub(crate) fn run(self, args: &GlobalArgs) -> Result<()> {
        let db = args.open_db()?;
        let Some(latest) = db.latest_block().context("Failed to read the latest block")? else {
            info!(target: "logpoller_storage", "Database is empty, nothing to prune");
            return Ok(());
        };

        // blocks at or below `end` go, the last `keep_blocks` finalized ones stay
        let blocks = match latest.finalized_block_number.checked_sub(self.keep_blocks + 1) {
            Some(end) => db.delete_blocks_before(end, self.limit).context("Failed to prune blocks")?,
            None => 0,
        };
        let logs = db.delete_expired_logs(self.limit).context("Failed to prune expired logs")?;
        info!(target: "logpoller_storage", blocks, logs, "Pruned database");
        Ok(())
    }
}
