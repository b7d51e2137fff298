use alloy_primitives::{Bytes, U256};
use alloy_sol_types::{SolValue, sol};
use logpoller_types::Log;
use std::fmt::Debug;
use thiserror::Error;

sol! {
    /// The log as passed to the `checkLog` function of a log-triggered upkeep.
    struct PackedLog {
        uint256 index;
        uint256 timestamp;
        bytes32 txHash;
        uint256 blockNumber;
        bytes32 blockHash;
        address source;
        bytes32[] topics;
        bytes data;
    }
}

/// Upper bound on the topics of an EVM log.
const MAX_LOG_TOPICS: usize = 4;

/// Errors of a [`LogDataPacker`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackerError {
    /// The log carries more topics than the EVM allows.
    #[error("log has {0} topics")]
    TooManyTopics(usize),
}

/// Encodes a log into the check data of a log-triggered upkeep.
pub trait LogDataPacker: Debug + Send + Sync {
    /// Packs `log`.
    fn pack_log_data(&self, log: &Log) -> Result<Bytes, PackerError>;
}

/// [`LogDataPacker`] producing the ABI encoding of the log tuple.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbiLogDataPacker;

impl LogDataPacker for AbiLogDataPacker {
    fn pack_log_data(&self, log: &Log) -> Result<Bytes, PackerError> {
        if log.topics.len() > MAX_LOG_TOPICS {
            return Err(PackerError::TooManyTopics(log.topics.len()));
        }
        let packed = PackedLog {
            index: U256::from(log.log_index),
            timestamp: U256::from(log.block_timestamp),
            txHash: log.tx_hash,
            blockNumber: U256::from(log.block_number),
            blockHash: log.block_hash,
            source: log.address,
            topics: log.topics.clone(),
            data: log.data.clone(),
        };
        Ok(packed.abi_encode().into())
    }
}
