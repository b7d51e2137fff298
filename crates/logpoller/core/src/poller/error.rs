use crate::ClientError;
use alloy_eips::BlockNumHash;
use logpoller_storage::StorageError;
use logpoller_types::FilterError;
use thiserror::Error;

/// Errors of the [`LogPoller`](crate::LogPoller).
#[derive(Debug, Error)]
pub enum LogPollerError {
    /// The remote chain could not be read.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The filter was rejected.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Nothing has been ingested yet.
    #[error("no blocks ingested yet")]
    NoBlocks,

    /// The node does not serve a block it advertised.
    #[error("block {0} is not available from the node")]
    MissingBlock(u64),

    /// No stored block above the finalized watermark is still canonical.
    #[error("reorg below finalized block {finalized} detected at block {number}")]
    FinalityViolation {
        /// The stored block the search started from.
        number: u64,
        /// Finalized watermark of that block.
        finalized: u64,
    },

    /// The node served logs of a block other than the one requested.
    #[error("requested logs of block {expected:?}, got a log of block {got:?}")]
    OrphanedLogs {
        /// The block whose logs were requested.
        expected: BlockNumHash,
        /// The block of the offending log.
        got: BlockNumHash,
    },

    /// Replay was requested past the latest ingested block.
    #[error("cannot replay from block {from}, latest ingested block is {latest}")]
    InvalidReplayBlock {
        /// Requested start block.
        from: u64,
        /// Latest ingested block.
        latest: u64,
    },
}
