use crate::{LogSource, RecoveryError};
use std::{sync::Arc, time::Duration};

/// Estimates the average block time from the stored blocks.
#[derive(Debug, Clone)]
pub struct BlockTimeResolver {
    source: Arc<dyn LogSource>,
}

impl BlockTimeResolver {
    /// Creates a resolver reading blocks from `source`.
    pub fn new(source: Arc<dyn LogSource>) -> Self {
        Self { source }
    }

    /// Returns the average block time over the last `sample_size` blocks.
    ///
    /// The two most distant stored blocks of the sample are used, so gaps left by range
    /// backfills do not skew the estimate.
    pub async fn block_time(&self, sample_size: u64) -> Result<Duration, RecoveryError> {
        let latest = self.source.latest_block().await?;
        let start = latest.block_number.saturating_sub(sample_size);
        let blocks = self.source.blocks_range(start, latest.block_number).await?;

        match (blocks.first(), blocks.last()) {
            (Some(first), Some(last)) if last.block_number > first.block_number => {
                let elapsed = last.block_timestamp.saturating_sub(first.block_timestamp);
                let millis = elapsed * 1000 / (last.block_number - first.block_number);
                Ok(Duration::from_millis(millis))
            }
            _ => Err(RecoveryError::NotEnoughBlocks),
        }
    }
}
