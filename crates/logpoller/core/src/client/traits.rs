use crate::ClientError;
use alloy_eips::BlockNumHash;
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use derive_more::Constructor;
use logpoller_types::Log;
use std::fmt::Debug;

/// The subset of a block header the poller needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Constructor)]
pub struct BlockHeader {
    /// Block height.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Hash of the parent block.
    pub parent_hash: B256,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
}

impl BlockHeader {
    /// Returns the number and hash of the block.
    pub const fn id(&self) -> BlockNumHash {
        BlockNumHash { number: self.number, hash: self.hash }
    }
}

/// The remote chain tip together with its finality watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Constructor)]
pub struct ChainHead {
    /// The latest block.
    pub latest: BlockHeader,
    /// Height of the latest finalized block.
    pub finalized_number: u64,
}

/// Remote chain reader.
///
/// Implementations are treated as unreliable: calls may time out, return stale data or serve a
/// fork that has since been orphaned. Callers verify what they persist.
#[async_trait]
pub trait ChainClient: Debug + Send + Sync {
    /// Returns the current chain head.
    async fn chain_head(&self) -> Result<ChainHead, ClientError>;

    /// Returns the canonical header at `number`, `None` if the node has not seen it yet.
    async fn header_by_number(&self, number: u64) -> Result<Option<BlockHeader>, ClientError>;

    /// Returns the logs emitted by any of `addresses` with any of `event_sigs` as topic0 in
    /// `from_block..=to_block`.
    async fn logs_in_range(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &[Address],
        event_sigs: &[B256],
    ) -> Result<Vec<Log>, ClientError>;

    /// Like [`Self::logs_in_range`] for the single block with the given hash.
    async fn logs_by_block_hash(
        &self,
        block_hash: B256,
        addresses: &[Address],
        event_sigs: &[B256],
    ) -> Result<Vec<Log>, ClientError>;

    /// Returns the block currently holding the transaction, `None` if it is not mined.
    async fn tx_block(&self, tx_hash: B256) -> Result<Option<BlockNumHash>, ClientError>;
}
