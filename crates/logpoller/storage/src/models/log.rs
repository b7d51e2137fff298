//! Models for storing ingested logs.
//!
//! Logs live in the [`Logs`] table keyed by [`LogKey`], whose big-endian layout makes a cursor
//! walk return logs in `(block_number, log_index)` order. The [`EventLogs`] table is a secondary
//! index keyed by [`EventLogKey`] that groups the same logs by `(address, event_sig)` first,
//! which keeps address/event scoped queries and retention off the full log table.

use alloy_primitives::{Address, B256, Bytes, ChainId};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use logpoller_types::Log;
use reth_db_api::{
    DatabaseError,
    table::{Decode, Encode, Table},
};
use serde::{Deserialize, Serialize};

/// Primary key of a log: `block_number ‖ log_index ‖ block_hash`, big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogKey {
    /// Height of the block containing the log.
    pub block_number: u64,
    /// Position of the log within the block.
    pub log_index: u64,
    /// Hash of the block containing the log.
    pub block_hash: B256,
}

impl LogKey {
    /// The smallest key at `block_number`.
    pub const fn first_at(block_number: u64) -> Self {
        Self { block_number, log_index: 0, block_hash: B256::ZERO }
    }

    /// The largest key at `block_number`.
    pub const fn last_at(block_number: u64) -> Self {
        Self { block_number, log_index: u64::MAX, block_hash: B256::repeat_byte(0xff) }
    }
}

impl From<&Log> for LogKey {
    fn from(log: &Log) -> Self {
        Self { block_number: log.block_number, log_index: log.log_index, block_hash: log.block_hash }
    }
}

impl Encode for LogKey {
    type Encoded = [u8; 48];

    fn encode(self) -> Self::Encoded {
        let mut buf = [0u8; 48];
        buf[..8].copy_from_slice(&self.block_number.to_be_bytes());
        buf[8..16].copy_from_slice(&self.log_index.to_be_bytes());
        buf[16..].copy_from_slice(self.block_hash.as_slice());
        buf
    }
}

impl Decode for LogKey {
    fn decode(value: &[u8]) -> Result<Self, DatabaseError> {
        if value.len() != 48 {
            return Err(DatabaseError::Decode);
        }
        Ok(Self {
            block_number: read_u64(&value[..8])?,
            log_index: read_u64(&value[8..16])?,
            block_hash: B256::from_slice(&value[16..]),
        })
    }
}

/// Secondary key of a log: `address ‖ event_sig ‖ block_number ‖ log_index ‖ block_hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventLogKey {
    /// Emitting contract.
    pub address: Address,
    /// Event signature.
    pub event_sig: B256,
    /// Height of the block containing the log.
    pub block_number: u64,
    /// Position of the log within the block.
    pub log_index: u64,
    /// Hash of the block containing the log.
    pub block_hash: B256,
}

impl EventLogKey {
    /// The smallest key for `(address, event_sig)` at `block_number`.
    pub const fn first_at(address: Address, event_sig: B256, block_number: u64) -> Self {
        Self { address, event_sig, block_number, log_index: 0, block_hash: B256::ZERO }
    }

    /// The largest key for `(address, event_sig)` at `block_number`.
    pub const fn last_at(address: Address, event_sig: B256, block_number: u64) -> Self {
        Self {
            address,
            event_sig,
            block_number,
            log_index: u64::MAX,
            block_hash: B256::repeat_byte(0xff),
        }
    }

    /// Returns the primary key of the indexed log.
    pub const fn log_key(&self) -> LogKey {
        LogKey {
            block_number: self.block_number,
            log_index: self.log_index,
            block_hash: self.block_hash,
        }
    }
}

impl From<&Log> for EventLogKey {
    fn from(log: &Log) -> Self {
        Self {
            address: log.address,
            event_sig: log.event_sig,
            block_number: log.block_number,
            log_index: log.log_index,
            block_hash: log.block_hash,
        }
    }
}

impl Encode for EventLogKey {
    type Encoded = [u8; 100];

    fn encode(self) -> Self::Encoded {
        let mut buf = [0u8; 100];
        buf[..20].copy_from_slice(self.address.as_slice());
        buf[20..52].copy_from_slice(self.event_sig.as_slice());
        buf[52..60].copy_from_slice(&self.block_number.to_be_bytes());
        buf[60..68].copy_from_slice(&self.log_index.to_be_bytes());
        buf[68..].copy_from_slice(self.block_hash.as_slice());
        buf
    }
}

impl Decode for EventLogKey {
    fn decode(value: &[u8]) -> Result<Self, DatabaseError> {
        if value.len() != 100 {
            return Err(DatabaseError::Decode);
        }
        Ok(Self {
            address: Address::from_slice(&value[..20]),
            event_sig: B256::from_slice(&value[20..52]),
            block_number: read_u64(&value[52..60])?,
            log_index: read_u64(&value[60..68])?,
            block_hash: B256::from_slice(&value[68..]),
        })
    }
}

fn read_u64(bytes: &[u8]) -> Result<u64, DatabaseError> {
    bytes.try_into().map(u64::from_be_bytes).map_err(|_| DatabaseError::Decode)
}

/// Log body stored in the [`Logs`] table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, RlpEncodable, RlpDecodable)]
pub struct LogRecord {
    /// Emitting contract.
    pub address: Address,
    /// Event signature.
    pub event_sig: B256,
    /// All topics including the signature.
    pub topics: Vec<B256>,
    /// Unindexed data.
    pub data: Bytes,
    /// Emitting transaction.
    pub tx_hash: B256,
    /// Timestamp of the containing block.
    pub block_timestamp: u64,
    /// Insertion time.
    pub created_at: u64,
}

impl From<&Log> for LogRecord {
    fn from(log: &Log) -> Self {
        Self {
            address: log.address,
            event_sig: log.event_sig,
            topics: log.topics.clone(),
            data: log.data.clone(),
            tx_hash: log.tx_hash,
            block_timestamp: log.block_timestamp,
            created_at: log.created_at,
        }
    }
}

impl LogRecord {
    /// Rebuilds the domain log stored under `key`.
    pub fn into_log(self, chain_id: ChainId, key: LogKey) -> Log {
        Log {
            chain_id,
            block_hash: key.block_hash,
            block_number: key.block_number,
            block_timestamp: self.block_timestamp,
            log_index: key.log_index,
            address: self.address,
            event_sig: self.event_sig,
            topics: self.topics,
            data: self.data,
            tx_hash: self.tx_hash,
            created_at: self.created_at,
        }
    }
}

/// Ingested logs.
///
/// - **Key**: [`LogKey`]
/// - **Value**: [`LogRecord`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Logs;

impl Table for Logs {
    const NAME: &'static str = "logs";
    const DUPSORT: bool = false;

    type Key = LogKey;
    type Value = LogRecord;
}

/// `(address, event_sig)` index over [`Logs`]; the value is the block timestamp of the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct EventLogs;

impl Table for EventLogs {
    const NAME: &'static str = "event_logs";
    const DUPSORT: bool = false;

    type Key = EventLogKey;
    type Value = u64;
}
