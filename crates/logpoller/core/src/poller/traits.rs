use crate::LogPollerError;
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use logpoller_types::{Log, LogPollerBlock};
use std::fmt::Debug;

/// Read access to ingested blocks and logs, as consumed by the recoverer.
#[async_trait]
pub trait LogSource: Debug + Send + Sync {
    /// Returns the latest ingested block.
    async fn latest_block(&self) -> Result<LogPollerBlock, LogPollerError>;

    /// Returns the logs of `address` with any of `event_sigs` in `start..=end`.
    async fn logs_with_sigs(
        &self,
        start: u64,
        end: u64,
        event_sigs: &[B256],
        address: Address,
    ) -> Result<Vec<Log>, LogPollerError>;

    /// Returns the ingested blocks in `start..=end`.
    async fn blocks_range(&self, start: u64, end: u64)
    -> Result<Vec<LogPollerBlock>, LogPollerError>;
}
