//! Automation upkeep types produced by the log recoverer.

use crate::Log;
use alloy_primitives::{B256, Bytes, U256, keccak256};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Byte of an [`UpkeepId`] carrying its [`UpkeepType`].
const UPKEEP_TYPE_BYTE_INDEX: usize = 15;

/// A 256-bit automation upkeep identifier.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, From, Serialize,
    Deserialize,
)]
pub struct UpkeepId(pub B256);

impl UpkeepId {
    /// Builds an identifier from its integer representation.
    pub fn from_u256(value: U256) -> Self {
        Self(B256::from(value))
    }

    /// Returns the integer representation of the identifier.
    pub fn to_u256(self) -> U256 {
        U256::from_be_bytes(self.0.0)
    }

    /// Decodes the upkeep type embedded in the identifier.
    ///
    /// Identifiers with any non-zero byte in `4..15` predate typed identifiers and are always
    /// conditional.
    pub fn upkeep_type(&self) -> UpkeepType {
        if self.0[4..UPKEEP_TYPE_BYTE_INDEX].iter().any(|b| *b != 0) {
            return UpkeepType::Conditional;
        }
        match self.0[UPKEEP_TYPE_BYTE_INDEX] {
            1 => UpkeepType::LogTrigger,
            _ => UpkeepType::Conditional,
        }
    }
}

/// The kind of an automation upkeep.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpkeepType {
    /// Triggered by a block-based condition.
    Conditional,
    /// Triggered by an on-chain log.
    LogTrigger,
}

/// Deduplication key of an upkeep payload.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize,
    Deserialize,
)]
pub struct WorkId(pub B256);

impl WorkId {
    /// Computes the work id of an upkeep for the given trigger.
    ///
    /// Only the log trigger extension contributes to the id: the trigger's own block number and
    /// hash describe where the work is checked, not which log it is about.
    pub fn new(upkeep_id: &UpkeepId, trigger: &Trigger) -> Self {
        let mut preimage = upkeep_id.0.to_vec();
        if let Some(ext) = &trigger.log_trigger_extension {
            preimage.extend_from_slice(&ext.log_identifier());
        }
        Self(keccak256(preimage))
    }
}

/// Identifies the log behind a log-triggered upkeep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LogTriggerExtension {
    /// Transaction that emitted the log.
    pub tx_hash: B256,
    /// Log index within its block.
    pub index: u64,
    /// Hash of the block containing the log.
    pub block_hash: B256,
    /// Height of the block containing the log.
    pub block_number: u64,
}

impl LogTriggerExtension {
    /// Returns the bytes uniquely identifying the log: `block_hash ‖ tx_hash ‖ decimal(index)`.
    pub fn log_identifier(&self) -> Vec<u8> {
        let index = self.index.to_string();
        let mut id = Vec::with_capacity(64 + index.len());
        id.extend_from_slice(self.block_hash.as_slice());
        id.extend_from_slice(self.tx_hash.as_slice());
        id.extend_from_slice(index.as_bytes());
        id
    }
}

/// The block (and optionally the log) an upkeep check is performed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Trigger {
    /// Height of the check block.
    pub block_number: u64,
    /// Hash of the check block.
    pub block_hash: B256,
    /// Present for log-triggered upkeeps.
    pub log_trigger_extension: Option<LogTriggerExtension>,
}

impl Trigger {
    /// Builds a log trigger checked at the block containing the log.
    pub const fn from_log(log: &Log) -> Self {
        Self {
            block_number: log.block_number,
            block_hash: log.block_hash,
            log_trigger_extension: Some(LogTriggerExtension {
                tx_hash: log.tx_hash,
                index: log.log_index,
                block_hash: log.block_hash,
                block_number: log.block_number,
            }),
        }
    }

    /// Builds a log trigger with no check block assigned yet.
    pub const fn unanchored(log: &Log) -> Self {
        let mut trigger = Self::from_log(log);
        trigger.block_number = 0;
        trigger.block_hash = B256::ZERO;
        trigger
    }
}

/// A unit of work handed to the upkeep checking pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpkeepPayload {
    /// The upkeep to check.
    pub upkeep_id: UpkeepId,
    /// What triggered the check.
    pub trigger: Trigger,
    /// Deduplication key derived from the upkeep and trigger.
    pub work_id: WorkId,
    /// ABI encoded input of the check.
    pub check_data: Bytes,
}

impl UpkeepPayload {
    /// Creates a payload, deriving its [`WorkId`].
    pub fn new(upkeep_id: UpkeepId, trigger: Trigger, check_data: Bytes) -> Self {
        let work_id = WorkId::new(&upkeep_id, &trigger);
        Self { upkeep_id, trigger, work_id, check_data }
    }
}

impl From<&UpkeepPayload> for CoordinatedBlockProposal {
    fn from(payload: &UpkeepPayload) -> Self {
        Self { upkeep_id: payload.upkeep_id, trigger: payload.trigger, work_id: payload.work_id }
    }
}

/// A recovery proposal agreed upon by the upkeep coordination layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoordinatedBlockProposal {
    /// The upkeep to check.
    pub upkeep_id: UpkeepId,
    /// The trigger, with its check block possibly assigned by the coordinator.
    pub trigger: Trigger,
    /// Work id of the proposed payload.
    pub work_id: WorkId,
}

/// Processing state of a unit of work as tracked by the upkeep state store.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UpkeepState {
    /// Not seen as performed or ineligible yet.
    #[default]
    Unknown,
    /// The work has been performed on chain.
    Performed,
    /// The work was checked and found ineligible.
    Ineligible,
}

impl UpkeepState {
    /// Returns `true` for states that never change again.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Performed | Self::Ineligible)
    }
}
