//! Adaptive batching for bulk log inserts.

use crate::StorageError;
use std::time::{Duration, Instant};
use tracing::warn;

/// Default number of logs written per batch.
pub const DEFAULT_BATCH_SIZE: usize = 4000;

/// Batches are never shrunk below this size.
pub const MIN_BATCH_SIZE: usize = 500;

/// Tuning of bulk inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Initial batch size.
    pub batch_size: usize,
    /// Size below which a timed out batch is not retried.
    pub min_batch_size: usize,
    /// Maximum time a single batch write may take. `None` disables the check.
    pub statement_timeout: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            min_batch_size: MIN_BATCH_SIZE,
            statement_timeout: None,
        }
    }
}

impl BatchConfig {
    /// Fails with [`StorageError::Timeout`] when a batch started at `started` ran past the
    /// statement timeout.
    pub fn check_deadline(&self, started: Instant) -> Result<(), StorageError> {
        match self.statement_timeout {
            Some(timeout) if started.elapsed() >= timeout => Err(StorageError::Timeout(timeout)),
            _ => Ok(()),
        }
    }
}

/// Writes `items` in consecutive batches through `write`.
///
/// When a batch times out and the current size is still above the floor, the size is halved
/// and the same batch is retried. `write` must be idempotent since a retried batch may have been
/// partially written.
pub fn insert_in_batches<T, F>(
    items: &[T],
    config: &BatchConfig,
    mut write: F,
) -> Result<(), StorageError>
where
    F: FnMut(&[T]) -> Result<(), StorageError>,
{
    let mut batch_size = config.batch_size.max(1);
    let mut start = 0;
    while start < items.len() {
        let end = (start + batch_size).min(items.len());
        match write(&items[start..end]) {
            Ok(()) => start = end,
            Err(err) if err.is_timeout() && batch_size > config.min_batch_size => {
                batch_size /= 2;
                warn!(
                    target: "logpoller_storage",
                    batch_size,
                    offset = start,
                    "Batch insert timed out, retrying with a smaller batch"
                );
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
