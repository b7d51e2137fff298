use alloy_eips::BlockNumHash;
use alloy_primitives::{B256, ChainId};
use serde::{Deserialize, Serialize};

/// A block processed by the log poller.
///
/// At most one block is stored per height and chain. The stored finalized watermark is the
/// finalized height reported by the node at the time the block was ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogPollerBlock {
    /// The chain the block belongs to.
    pub chain_id: ChainId,
    /// Block hash.
    pub block_hash: B256,
    /// Block height.
    pub block_number: u64,
    /// Unix timestamp (seconds) of the block.
    pub block_timestamp: u64,
    /// Latest finalized height known when the block was ingested.
    pub finalized_block_number: u64,
    /// Unix timestamp (seconds) at which the block was stored.
    pub created_at: u64,
}

impl LogPollerBlock {
    /// Returns the `(number, hash)` identifier of the block.
    pub const fn id(&self) -> BlockNumHash {
        BlockNumHash { number: self.block_number, hash: self.block_hash }
    }
}
