//! Storage traits consumed by the log poller and its clients.
//!
//! Every operation is scoped to the chain the store was opened for. Write operations run in a
//! single transaction: either everything they touch is committed or nothing is.

use crate::StorageError;
use alloy_primitives::{Address, B256};
use logpoller_types::{Confirmations, Filter, Log, LogPollerBlock, TopicIndex};
use std::{collections::BTreeMap, fmt::Debug};

/// Read access to processed blocks.
pub trait BlockStorageReader {
    /// Returns the block stored at `number`.
    fn block_by_number(&self, number: u64) -> Result<Option<LogPollerBlock>, StorageError>;

    /// Returns the stored block with the given hash.
    fn block_by_hash(&self, hash: B256) -> Result<Option<LogPollerBlock>, StorageError>;

    /// Returns the highest stored block.
    fn latest_block(&self) -> Result<Option<LogPollerBlock>, StorageError>;

    /// Returns the stored blocks with heights in `start..=end`, ascending. Heights that were
    /// never stored are skipped.
    fn blocks_range(&self, start: u64, end: u64) -> Result<Vec<LogPollerBlock>, StorageError>;
}

/// Write access to blocks and logs.
pub trait LogStorageWriter {
    /// Stores a block. A no-op if the height is already stored.
    fn insert_block(&self, block: &LogPollerBlock) -> Result<(), StorageError>;

    /// Stores logs, skipping the ones already stored.
    fn insert_logs(&self, logs: &[Log]) -> Result<(), StorageError>;

    /// Stores logs together with the block that marks them as processed, atomically.
    fn insert_logs_with_block(
        &self,
        logs: &[Log],
        block: &LogPollerBlock,
    ) -> Result<(), StorageError>;

    /// Removes every block and log at or above `start`, atomically.
    fn delete_logs_and_blocks_after(&self, start: u64) -> Result<(), StorageError>;
}

/// Range queries over stored logs.
///
/// Results are ordered by `(block_number, log_index)` ascending. Block bounds are inclusive.
/// Confirmation requirements are resolved against the latest stored block.
pub trait LogStorageReader {
    /// Logs of `(address, event_sig)` in `start..=end`.
    fn select_logs(
        &self,
        start: u64,
        end: u64,
        address: Address,
        event_sig: B256,
    ) -> Result<Vec<Log>, StorageError>;

    /// Logs of `address` matching any of `event_sigs` in `start..=end`.
    fn select_logs_with_sigs(
        &self,
        start: u64,
        end: u64,
        address: Address,
        event_sigs: &[B256],
    ) -> Result<Vec<Log>, StorageError>;

    /// Every log in `start..=end`.
    fn select_logs_by_block_range(&self, start: u64, end: u64) -> Result<Vec<Log>, StorageError>;

    /// Logs of `(address, event_sig)` whose block timestamp is strictly after `after`.
    fn select_logs_created_after(
        &self,
        address: Address,
        event_sig: B256,
        after: u64,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError>;

    /// The most recent confirmed log of `(address, event_sig)`.
    fn select_latest_log_by_event_sig_with_confs(
        &self,
        event_sig: B256,
        address: Address,
        confs: Confirmations,
    ) -> Result<Option<Log>, StorageError>;

    /// For every `(address, event_sig)` pair, the logs of the highest confirmed block above
    /// `from_block` containing that pair.
    fn select_latest_log_event_sigs_addrs_with_confs(
        &self,
        from_block: u64,
        addresses: &[Address],
        event_sigs: &[B256],
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError>;

    /// Highest confirmed block above `from_block` containing a matching log, `0` if none.
    fn select_latest_block_by_event_sigs_addrs_with_confs(
        &self,
        from_block: u64,
        event_sigs: &[B256],
        addresses: &[Address],
        confs: Confirmations,
    ) -> Result<u64, StorageError>;

    /// Confirmed logs of `(address, event_sig)` whose topic at `topic_index` is one of
    /// `topic_values`.
    fn select_indexed_logs(
        &self,
        address: Address,
        event_sig: B256,
        topic_index: TopicIndex,
        topic_values: &[B256],
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError>;

    /// Like [`Self::select_indexed_logs`] restricted to `start..=end`, without confirmations.
    fn select_indexed_logs_by_block_range(
        &self,
        start: u64,
        end: u64,
        address: Address,
        event_sig: B256,
        topic_index: TopicIndex,
        topic_values: &[B256],
    ) -> Result<Vec<Log>, StorageError>;

    /// Like [`Self::select_indexed_logs`] restricted to block timestamps after `after`.
    fn select_indexed_logs_created_after(
        &self,
        address: Address,
        event_sig: B256,
        topic_index: TopicIndex,
        topic_values: &[B256],
        after: u64,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError>;

    /// Confirmed logs whose topic at `topic_index` is at least `topic_value_min`.
    fn select_indexed_logs_topic_greater_than(
        &self,
        address: Address,
        event_sig: B256,
        topic_index: TopicIndex,
        topic_value_min: B256,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError>;

    /// Confirmed logs whose topic at `topic_index` lies in `topic_value_min..=topic_value_max`.
    fn select_indexed_logs_topic_range(
        &self,
        address: Address,
        event_sig: B256,
        topic_index: TopicIndex,
        topic_value_min: B256,
        topic_value_max: B256,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError>;

    /// Confirmed `sig_a` logs in `start..=end` for which no confirmed `sig_b` log of the same
    /// address in the same range shares the topic at `topic_index`.
    #[allow(clippy::too_many_arguments)]
    fn select_indexed_logs_with_sigs_excluding(
        &self,
        sig_a: B256,
        sig_b: B256,
        topic_index: TopicIndex,
        address: Address,
        start: u64,
        end: u64,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError>;

    /// Logs of `(address, event_sig)` emitted by `tx_hash`.
    fn select_indexed_logs_by_tx_hash(
        &self,
        address: Address,
        event_sig: B256,
        tx_hash: B256,
    ) -> Result<Vec<Log>, StorageError>;

    /// Confirmed logs whose data word at `word_index` lies in `word_value_min..=word_value_max`.
    fn select_logs_data_word_range(
        &self,
        address: Address,
        event_sig: B256,
        word_index: usize,
        word_value_min: B256,
        word_value_max: B256,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError>;

    /// Confirmed logs whose data word at `word_index` is at least `word_value_min`.
    fn select_logs_data_word_greater_than(
        &self,
        address: Address,
        event_sig: B256,
        word_index: usize,
        word_value_min: B256,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError>;

    /// Confirmed logs with `word[word_index_min] <= word_value <= word[word_index_max]`.
    fn select_logs_data_word_between(
        &self,
        address: Address,
        event_sig: B256,
        word_index_min: usize,
        word_index_max: usize,
        word_value: B256,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError>;
}

/// Persistent filter registry.
pub trait FilterStorage {
    /// Inserts or merges `filter`, returning the stored result.
    fn insert_filter(&self, filter: &Filter) -> Result<Filter, StorageError>;

    /// Loads every registered filter by name.
    fn load_filters(&self) -> Result<BTreeMap<String, Filter>, StorageError>;

    /// Deletes the filter named `name`. Filters with other names are untouched.
    fn delete_filter(&self, name: &str) -> Result<(), StorageError>;
}

/// Retention of old data.
pub trait RetentionStorage {
    /// Deletes blocks at or below `end`, at most `limit` of them when `limit > 0`. Returns the
    /// number of blocks removed.
    fn delete_blocks_before(&self, end: u64, limit: usize) -> Result<usize, StorageError>;

    /// Deletes logs whose retention has elapsed, at most `limit` of them when `limit > 0`.
    ///
    /// A log's retention is the maximum retention of the filters naming its
    /// `(address, event_sig)`; a pair named by any filter with zero retention is kept forever.
    fn delete_expired_logs(&self, limit: usize) -> Result<usize, StorageError>;
}

/// The complete log store of a chain.
pub trait LogStore:
    BlockStorageReader
    + LogStorageReader
    + LogStorageWriter
    + FilterStorage
    + RetentionStorage
    + Debug
    + Send
    + Sync
{
}

impl<T> LogStore for T where
    T: BlockStorageReader
        + LogStorageReader
        + LogStorageWriter
        + FilterStorage
        + RetentionStorage
        + Debug
        + Send
        + Sync
{
}
