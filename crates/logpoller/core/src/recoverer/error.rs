use crate::{ClientError, LogPollerError, PackerError};
use alloy_primitives::B256;
use logpoller_types::{UpkeepId, UpkeepState, WorkId};
use thiserror::Error;

/// Errors of the [`LogRecoverer`](crate::LogRecoverer).
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Ingested data could not be read.
    #[error(transparent)]
    LogSource(#[from] LogPollerError),

    /// The remote chain could not be read.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A log could not be turned into check data.
    #[error(transparent)]
    Packer(#[from] PackerError),

    /// The upkeep state store failed.
    #[error("failed to read upkeep states: {0}")]
    StateReader(String),

    /// The state store returned a different number of states than requested.
    #[error("log and state count mismatch: {logs} != {states}")]
    StateCountMismatch {
        /// Number of requested work ids.
        logs: usize,
        /// Number of returned states.
        states: usize,
    },

    /// The upkeep is not log-triggered.
    #[error("not a log trigger upkeep ID: {0}")]
    NotLogTrigger(UpkeepId),

    /// No filter is registered for the upkeep.
    #[error("filter not found for upkeep {0}")]
    FilterNotFound(UpkeepId),

    /// The proposal carries no log trigger extension.
    #[error("missing log trigger extension")]
    MissingLogTriggerExtension,

    /// The transaction of the log is not mined.
    #[error("failed to get block of tx {0}")]
    TxNotFound(B256),

    /// The transaction of the log moved to another block.
    #[error("log tx reorged")]
    TxReorged,

    /// The log is outside the recovery window.
    #[error("log block {0} is not recoverable")]
    NotRecoverable(u64),

    /// The work was already performed or found ineligible.
    #[error("upkeep state {0} is not recoverable")]
    TerminalState(UpkeepState),

    /// The log predates the current trigger configuration of the upkeep.
    #[error(
        "log block {block} is before the filter configUpdateBlock {config_update_block} for upkeepID {upkeep_id}"
    )]
    BeforeConfigUpdate {
        /// Block of the log.
        block: u64,
        /// Block of the last trigger config update.
        config_update_block: u64,
        /// The upkeep.
        upkeep_id: UpkeepId,
    },

    /// No log around the proposal block yields the proposal work id.
    #[error("no log found for upkeepID {upkeep_id} and work id {work_id}")]
    LogNotFound {
        /// The upkeep.
        upkeep_id: UpkeepId,
        /// The work id of the proposal.
        work_id: WorkId,
    },

    /// The upkeep reached its pending payload cap.
    #[error("upkeep {0} has too many payloads in pending queue")]
    TooManyPending(UpkeepId),

    /// Not enough blocks are stored to estimate the block time.
    #[error("not enough blocks to estimate block time")]
    NotEnoughBlocks,

    /// The pending queue task stopped.
    #[error("pending queue is closed")]
    QueueClosed,
}
