use crate::LogPollerBlock;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// How deep a log must be buried before a query returns it.
///
/// Depths are always resolved against the latest block stored locally, never against the remote
/// head, so results are consistent with what has been ingested.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmations {
    /// Only logs at or below the latest finalized height.
    #[display("finalized")]
    Finalized,
    /// Only logs at least `n` blocks below the latest block. `Depth(0)` returns everything.
    #[display("{_0}")]
    Depth(u64),
}

impl Default for Confirmations {
    fn default() -> Self {
        Self::UNCONFIRMED
    }
}

impl Confirmations {
    /// No confirmation requirement.
    pub const UNCONFIRMED: Self = Self::Depth(0);

    /// Resolves the highest block number a query may return given the latest stored block.
    pub const fn resolve(&self, latest: &LogPollerBlock) -> u64 {
        match self {
            Self::Finalized => latest.finalized_block_number,
            Self::Depth(depth) => latest.block_number.saturating_sub(*depth),
        }
    }
}
