use alloy_primitives::ChainId;
use reth_db_api::DatabaseError;
use std::time::Duration;
use thiserror::Error;

/// Errors that may occur while interacting with log poller storage.
///
/// This enum is used across all implementations of the storage traits.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failure reported by the database backend.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The database environment could not be opened.
    #[error("failed to initialise database: {0}")]
    DatabaseInit(#[from] eyre::Report),

    /// The expected entry was not found in the database.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// A block or log was submitted for a chain other than the one the store serves.
    #[error("invalid chainID in log got {got} want {expected}")]
    ChainIdMismatch {
        /// Chain served by the store.
        expected: ChainId,
        /// Chain the rejected item belongs to.
        got: ChainId,
    },

    /// A write exceeded the configured statement timeout.
    #[error("statement timed out after {0:?}")]
    Timeout(Duration),
}

impl StorageError {
    /// Returns `true` if the error is a statement timeout.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
