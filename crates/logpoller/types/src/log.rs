//! Persisted log record.

use crate::{TopicIndex, WORD_SIZE};
use alloy_primitives::{Address, B256, Bytes, ChainId};
use serde::{Deserialize, Serialize};

/// A single EVM log as persisted by the log poller.
///
/// A log is uniquely identified within a chain by `(block_hash, log_index)`. Logs of an orphaned
/// block may briefly coexist with the canonical ones at the same height until the reorg is
/// unwound.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Log {
    /// The chain the log was emitted on.
    pub chain_id: ChainId,
    /// Hash of the block containing the log.
    pub block_hash: B256,
    /// Height of the block containing the log.
    pub block_number: u64,
    /// Unix timestamp (seconds) of the block containing the log.
    pub block_timestamp: u64,
    /// Position of the log within its block.
    pub log_index: u64,
    /// Emitting contract.
    pub address: Address,
    /// The event signature, i.e. `topics[0]`.
    pub event_sig: B256,
    /// All topics including the event signature.
    pub topics: Vec<B256>,
    /// Unindexed event data.
    pub data: Bytes,
    /// Hash of the transaction that emitted the log.
    pub tx_hash: B256,
    /// Unix timestamp (seconds) at which the log was stored.
    pub created_at: u64,
}

impl Log {
    /// Returns the topic at the given index, if present.
    pub fn topic(&self, index: TopicIndex) -> Option<B256> {
        self.topics.get(index.get()).copied()
    }

    /// Returns the 32 byte data word at `word_index`.
    ///
    /// Returns `None` when the data is too short to contain the requested word.
    pub fn data_word(&self, word_index: usize) -> Option<B256> {
        let start = word_index.checked_mul(WORD_SIZE)?;
        let end = start.checked_add(WORD_SIZE)?;
        self.data.get(start..end).map(B256::from_slice)
    }

    /// Returns `true` if the log belongs to the block identified by `(number, hash)`.
    pub fn is_in_block(&self, number: u64, hash: B256) -> bool {
        self.block_number == number && self.block_hash == hash
    }
}
