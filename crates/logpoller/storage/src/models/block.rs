//! Models for storing processed blocks.

use alloy_primitives::{B256, ChainId};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use logpoller_types::LogPollerBlock;
use reth_db_api::table::Table;
use serde::{Deserialize, Serialize};

/// Block metadata stored in the [`Blocks`] table, keyed by height.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, RlpEncodable, RlpDecodable,
)]
pub struct BlockRecord {
    /// Block hash.
    pub hash: B256,
    /// Block timestamp.
    pub timestamp: u64,
    /// Finalized height observed when the block was ingested.
    pub finalized_block_number: u64,
    /// Insertion time.
    pub created_at: u64,
}

impl From<&LogPollerBlock> for BlockRecord {
    fn from(block: &LogPollerBlock) -> Self {
        Self {
            hash: block.block_hash,
            timestamp: block.block_timestamp,
            finalized_block_number: block.finalized_block_number,
            created_at: block.created_at,
        }
    }
}

impl BlockRecord {
    /// Rebuilds the domain block stored at `number`.
    pub const fn into_block(self, chain_id: ChainId, number: u64) -> LogPollerBlock {
        LogPollerBlock {
            chain_id,
            block_hash: self.hash,
            block_number: number,
            block_timestamp: self.timestamp,
            finalized_block_number: self.finalized_block_number,
            created_at: self.created_at,
        }
    }
}

/// Processed blocks by height.
///
/// - **Key**: `u64`, the block number
/// - **Value**: [`BlockRecord`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Blocks;

impl Table for Blocks {
    const NAME: &'static str = "blocks";
    const DUPSORT: bool = false;

    type Key = u64;
    type Value = BlockRecord;
}

/// Reverse index from block hash to height.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct BlockHashes;

impl Table for BlockHashes {
    const NAME: &'static str = "block_hashes";
    const DUPSORT: bool = false;

    type Key = B256;
    type Value = u64;
}
