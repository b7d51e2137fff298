//! Main database access structure and transaction contexts.

use crate::{
    StorageError,
    batch::{BatchConfig, insert_in_batches},
    models::{BlockRecord, Tables},
    providers::{BlockProvider, FilterProvider, LogProvider},
    query::{LogPredicate, LogQuery},
    traits::{
        BlockStorageReader, FilterStorage, LogStorageReader, LogStorageWriter, RetentionStorage,
    },
};
use alloy_primitives::{Address, B256, ChainId};
use logpoller_types::{Confirmations, Filter, Log, LogPollerBlock, TopicIndex};
use reth_db::{
    DatabaseEnv,
    mdbx::{DatabaseArguments, init_db_for},
};
use reth_db_api::{database::Database, transaction::DbTx};
use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
    time::{Instant, SystemTime, UNIX_EPOCH},
};
use tracing::{debug, info, warn};

type RoTx = <DatabaseEnv as Database>::TX;
type RwTx = <DatabaseEnv as Database>::TXMut;

/// Manages the database environment for a single chain.
/// Provides transactional access to data via providers.
#[derive(Debug)]
pub struct ChainDb {
    chain_id: ChainId,
    env: DatabaseEnv,
    batch: BatchConfig,
}

impl ChainDb {
    /// Creates or opens the database of `chain_id` at the given path.
    pub fn new(chain_id: ChainId, path: &Path) -> Result<Self, StorageError> {
        let env = init_db_for::<_, Tables>(path, DatabaseArguments::default())?;
        info!(target: "logpoller_storage", chain_id, path = %path.display(), "Opened chain database");
        Ok(Self { chain_id, env, batch: BatchConfig::default() })
    }

    /// Overrides the bulk insert tuning.
    pub const fn with_batch_config(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    /// The chain served by this database.
    pub const fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn view<T>(&self, f: impl FnOnce(&RoTx) -> Result<T, StorageError>) -> Result<T, StorageError> {
        self.env.view(f)?
    }

    /// Runs `f` in a write transaction, committing only if it succeeds.
    fn update<T>(
        &self,
        f: impl FnOnce(&RwTx) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let tx = self.env.tx_mut()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                tx.abort();
                Err(err)
            }
        }
    }

    fn ensure_chain(&self, chain_id: ChainId) -> Result<(), StorageError> {
        if chain_id != self.chain_id {
            warn!(
                target: "logpoller_storage",
                expected = self.chain_id,
                got = chain_id,
                "Rejecting write for foreign chain"
            );
            return Err(StorageError::ChainIdMismatch { expected: self.chain_id, got: chain_id });
        }
        Ok(())
    }

    fn write_logs(&self, tx: &RwTx, logs: &[Log], created_at: u64) -> Result<(), StorageError> {
        let provider = LogProvider::new(tx, self.chain_id);
        insert_in_batches(logs, &self.batch, |batch| {
            let started = Instant::now();
            provider.insert_logs(batch, created_at)?;
            self.batch.check_deadline(started)
        })
    }

    fn write_block(tx: &RwTx, block: &LogPollerBlock, created_at: u64) -> Result<(), StorageError> {
        let record = BlockRecord { created_at, ..BlockRecord::from(block) };
        BlockProvider::new(tx).insert_block(block.block_number, record)?;
        Ok(())
    }

    fn select(&self, query: &LogQuery) -> Result<Vec<Log>, StorageError> {
        self.view(|tx| LogProvider::new(tx, self.chain_id).select(query))
    }

    /// Confirmed logs of each `(address, event_sig)` pair above `from_block`.
    fn select_pairs_after(
        &self,
        from_block: u64,
        addresses: &[Address],
        event_sigs: &[B256],
        confs: Confirmations,
    ) -> Result<Vec<Vec<Log>>, StorageError> {
        self.view(|tx| {
            let provider = LogProvider::new(tx, self.chain_id);
            let mut groups = Vec::new();
            for address in addresses {
                for event_sig in event_sigs {
                    let query = LogQuery::event(*address, *event_sig)
                        .blocks(from_block.saturating_add(1), u64::MAX)
                        .confirmations(confs);
                    groups.push(provider.select(&query)?);
                }
            }
            Ok(groups)
        })
    }
}

/// Current unix time in seconds.
fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

impl BlockStorageReader for ChainDb {
    fn block_by_number(&self, number: u64) -> Result<Option<LogPollerBlock>, StorageError> {
        self.view(|tx| {
            let block = BlockProvider::new(tx).block(number)?;
            Ok(block.map(|record| record.into_block(self.chain_id, number)))
        })
    }

    fn block_by_hash(&self, hash: B256) -> Result<Option<LogPollerBlock>, StorageError> {
        self.view(|tx| {
            let block = BlockProvider::new(tx).block_by_hash(hash)?;
            Ok(block.map(|(number, record)| record.into_block(self.chain_id, number)))
        })
    }

    fn latest_block(&self) -> Result<Option<LogPollerBlock>, StorageError> {
        self.view(|tx| {
            let block = BlockProvider::new(tx).latest_block()?;
            Ok(block.map(|(number, record)| record.into_block(self.chain_id, number)))
        })
    }

    fn blocks_range(&self, start: u64, end: u64) -> Result<Vec<LogPollerBlock>, StorageError> {
        self.view(|tx| {
            let blocks = BlockProvider::new(tx).blocks_in_range(start, end)?;
            Ok(blocks
                .into_iter()
                .map(|(number, record)| record.into_block(self.chain_id, number))
                .collect())
        })
    }
}

impl LogStorageWriter for ChainDb {
    fn insert_block(&self, block: &LogPollerBlock) -> Result<(), StorageError> {
        self.ensure_chain(block.chain_id)?;
        let now = unix_now();
        self.update(|tx| Self::write_block(tx, block, now))
    }

    fn insert_logs(&self, logs: &[Log]) -> Result<(), StorageError> {
        for log in logs {
            self.ensure_chain(log.chain_id)?;
        }
        let now = unix_now();
        self.update(|tx| self.write_logs(tx, logs, now))
    }

    fn insert_logs_with_block(
        &self,
        logs: &[Log],
        block: &LogPollerBlock,
    ) -> Result<(), StorageError> {
        self.ensure_chain(block.chain_id)?;
        for log in logs {
            self.ensure_chain(log.chain_id)?;
        }
        let now = unix_now();
        self.update(|tx| {
            Self::write_block(tx, block, now)?;
            if !logs.is_empty() {
                self.write_logs(tx, logs, now)?;
            }
            Ok(())
        })?;
        debug!(
            target: "logpoller_storage",
            block_number = block.block_number,
            logs = logs.len(),
            "Stored logs with block"
        );
        Ok(())
    }

    fn delete_logs_and_blocks_after(&self, start: u64) -> Result<(), StorageError> {
        let (blocks, logs) = self.update(|tx| {
            let blocks = BlockProvider::new(tx).delete_blocks_from(start)?;
            let logs = LogProvider::new(tx, self.chain_id).delete_logs_from(start)?;
            Ok((blocks, logs))
        })?;
        info!(
            target: "logpoller_storage",
            start,
            blocks,
            logs,
            "Deleted blocks and logs"
        );
        Ok(())
    }
}

impl LogStorageReader for ChainDb {
    fn select_logs(
        &self,
        start: u64,
        end: u64,
        address: Address,
        event_sig: B256,
    ) -> Result<Vec<Log>, StorageError> {
        self.select(&LogQuery::event(address, event_sig).blocks(start, end))
    }

    fn select_logs_with_sigs(
        &self,
        start: u64,
        end: u64,
        address: Address,
        event_sigs: &[B256],
    ) -> Result<Vec<Log>, StorageError> {
        if event_sigs.is_empty() {
            return Ok(Vec::new());
        }
        let query = LogQuery {
            addresses: vec![address],
            event_sigs: event_sigs.to_vec(),
            ..Default::default()
        };
        self.select(&query.blocks(start, end))
    }

    fn select_logs_by_block_range(&self, start: u64, end: u64) -> Result<Vec<Log>, StorageError> {
        self.select(&LogQuery::default().blocks(start, end))
    }

    fn select_logs_created_after(
        &self,
        address: Address,
        event_sig: B256,
        after: u64,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError> {
        let query = LogQuery::event(address, event_sig)
            .confirmations(confs)
            .filter(LogPredicate::CreatedAfter(after));
        self.select(&query)
    }

    fn select_latest_log_by_event_sig_with_confs(
        &self,
        event_sig: B256,
        address: Address,
        confs: Confirmations,
    ) -> Result<Option<Log>, StorageError> {
        let mut logs = self.select(&LogQuery::event(address, event_sig).confirmations(confs))?;
        Ok(logs.pop())
    }

    fn select_latest_log_event_sigs_addrs_with_confs(
        &self,
        from_block: u64,
        addresses: &[Address],
        event_sigs: &[B256],
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError> {
        let mut latest = Vec::new();
        for mut group in self.select_pairs_after(from_block, addresses, event_sigs, confs)? {
            let Some(max) = group.last().map(|log| log.block_number) else {
                continue;
            };
            group.retain(|log| log.block_number == max);
            latest.extend(group);
        }
        latest.sort_by_key(|log| (log.block_number, log.log_index, log.block_hash));
        Ok(latest)
    }

    fn select_latest_block_by_event_sigs_addrs_with_confs(
        &self,
        from_block: u64,
        event_sigs: &[B256],
        addresses: &[Address],
        confs: Confirmations,
    ) -> Result<u64, StorageError> {
        let groups = self.select_pairs_after(from_block, addresses, event_sigs, confs)?;
        Ok(groups
            .iter()
            .filter_map(|group| group.last().map(|log| log.block_number))
            .max()
            .unwrap_or_default())
    }

    fn select_indexed_logs(
        &self,
        address: Address,
        event_sig: B256,
        topic_index: TopicIndex,
        topic_values: &[B256],
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError> {
        let query = LogQuery::event(address, event_sig).confirmations(confs).filter(
            LogPredicate::TopicIn { index: topic_index, values: topic_values.to_vec() },
        );
        self.select(&query)
    }

    fn select_indexed_logs_by_block_range(
        &self,
        start: u64,
        end: u64,
        address: Address,
        event_sig: B256,
        topic_index: TopicIndex,
        topic_values: &[B256],
    ) -> Result<Vec<Log>, StorageError> {
        let query = LogQuery::event(address, event_sig).blocks(start, end).filter(
            LogPredicate::TopicIn { index: topic_index, values: topic_values.to_vec() },
        );
        self.select(&query)
    }

    fn select_indexed_logs_created_after(
        &self,
        address: Address,
        event_sig: B256,
        topic_index: TopicIndex,
        topic_values: &[B256],
        after: u64,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError> {
        let query = LogQuery::event(address, event_sig)
            .confirmations(confs)
            .filter(LogPredicate::TopicIn { index: topic_index, values: topic_values.to_vec() })
            .filter(LogPredicate::CreatedAfter(after));
        self.select(&query)
    }

    fn select_indexed_logs_topic_greater_than(
        &self,
        address: Address,
        event_sig: B256,
        topic_index: TopicIndex,
        topic_value_min: B256,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError> {
        let query = LogQuery::event(address, event_sig).confirmations(confs).filter(
            LogPredicate::TopicRange {
                index: topic_index,
                min: topic_value_min,
                max: B256::repeat_byte(0xff),
            },
        );
        self.select(&query)
    }

    fn select_indexed_logs_topic_range(
        &self,
        address: Address,
        event_sig: B256,
        topic_index: TopicIndex,
        topic_value_min: B256,
        topic_value_max: B256,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError> {
        let query = LogQuery::event(address, event_sig).confirmations(confs).filter(
            LogPredicate::TopicRange { index: topic_index, min: topic_value_min, max: topic_value_max },
        );
        self.select(&query)
    }

    fn select_indexed_logs_with_sigs_excluding(
        &self,
        sig_a: B256,
        sig_b: B256,
        topic_index: TopicIndex,
        address: Address,
        start: u64,
        end: u64,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError> {
        let (mut logs, excluding) = self.view(|tx| {
            let provider = LogProvider::new(tx, self.chain_id);
            let a = LogQuery::event(address, sig_a).blocks(start, end).confirmations(confs);
            let b = LogQuery::event(address, sig_b).blocks(start, end).confirmations(confs);
            Ok((provider.select(&a)?, provider.select(&b)?))
        })?;
        let excluded: HashSet<B256> =
            excluding.iter().filter_map(|log| log.topic(topic_index)).collect();
        logs.retain(|log| log.topic(topic_index).is_none_or(|topic| !excluded.contains(&topic)));
        Ok(logs)
    }

    fn select_indexed_logs_by_tx_hash(
        &self,
        address: Address,
        event_sig: B256,
        tx_hash: B256,
    ) -> Result<Vec<Log>, StorageError> {
        self.select(&LogQuery::event(address, event_sig).filter(LogPredicate::TxHash(tx_hash)))
    }

    fn select_logs_data_word_range(
        &self,
        address: Address,
        event_sig: B256,
        word_index: usize,
        word_value_min: B256,
        word_value_max: B256,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError> {
        let query = LogQuery::event(address, event_sig).confirmations(confs).filter(
            LogPredicate::WordRange { index: word_index, min: word_value_min, max: word_value_max },
        );
        self.select(&query)
    }

    fn select_logs_data_word_greater_than(
        &self,
        address: Address,
        event_sig: B256,
        word_index: usize,
        word_value_min: B256,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError> {
        let query = LogQuery::event(address, event_sig).confirmations(confs).filter(
            LogPredicate::WordRange {
                index: word_index,
                min: word_value_min,
                max: B256::repeat_byte(0xff),
            },
        );
        self.select(&query)
    }

    fn select_logs_data_word_between(
        &self,
        address: Address,
        event_sig: B256,
        word_index_min: usize,
        word_index_max: usize,
        word_value: B256,
        confs: Confirmations,
    ) -> Result<Vec<Log>, StorageError> {
        let query = LogQuery::event(address, event_sig).confirmations(confs).filter(
            LogPredicate::WordsAround {
                lower: word_index_min,
                upper: word_index_max,
                value: word_value,
            },
        );
        self.select(&query)
    }
}

impl FilterStorage for ChainDb {
    fn insert_filter(&self, filter: &Filter) -> Result<Filter, StorageError> {
        self.update(|tx| FilterProvider::new(tx).upsert_filter(filter))
    }

    fn load_filters(&self) -> Result<BTreeMap<String, Filter>, StorageError> {
        self.view(|tx| FilterProvider::new(tx).filters())
    }

    fn delete_filter(&self, name: &str) -> Result<(), StorageError> {
        let existed = self.update(|tx| FilterProvider::new(tx).delete_filter(name))?;
        if !existed {
            debug!(target: "logpoller_storage", name, "Deleted filter was not registered");
        }
        Ok(())
    }
}

impl RetentionStorage for ChainDb {
    fn delete_blocks_before(&self, end: u64, limit: usize) -> Result<usize, StorageError> {
        self.update(|tx| BlockProvider::new(tx).delete_blocks_up_to(end, limit))
    }

    fn delete_expired_logs(&self, limit: usize) -> Result<usize, StorageError> {
        let now = unix_now();
        self.update(|tx| {
            // `None` pins the pair: some filter keeps its logs forever.
            let mut retention: BTreeMap<(Address, B256), Option<u64>> = BTreeMap::new();
            for filter in FilterProvider::new(tx).filters()?.values() {
                let secs = filter.retention.as_secs();
                for address in &filter.addresses {
                    for event_sig in &filter.event_sigs {
                        let entry = retention.entry((*address, *event_sig)).or_insert(Some(0));
                        *entry = match *entry {
                            Some(current) if !filter.retention.is_zero() => Some(current.max(secs)),
                            _ => None,
                        };
                    }
                }
            }

            let provider = LogProvider::new(tx, self.chain_id);
            let mut remaining = if limit > 0 { limit } else { usize::MAX };
            let mut deleted = 0;
            for ((address, event_sig), secs) in retention {
                let Some(secs) = secs else { continue };
                if remaining == 0 {
                    break;
                }
                let cutoff = now.saturating_sub(secs);
                let removed = provider.delete_event_logs_before(address, event_sig, cutoff, remaining)?;
                deleted += removed;
                remaining -= removed;
            }
            Ok(deleted)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    const CHAIN_ID: ChainId = 137;

    fn setup_db() -> (TempDir, ChainDb) {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db = ChainDb::new(CHAIN_ID, &tmp_dir.path().join("chaindb")).expect("open db");
        (tmp_dir, db)
    }

    fn block(number: u64, finalized: u64) -> LogPollerBlock {
        LogPollerBlock {
            chain_id: CHAIN_ID,
            block_hash: B256::with_last_byte(number as u8),
            block_number: number,
            block_timestamp: 1_000 + number,
            finalized_block_number: finalized,
            created_at: 0,
        }
    }

    fn log(number: u64, index: u64, address: Address, sig: B256) -> Log {
        Log {
            chain_id: CHAIN_ID,
            block_hash: B256::with_last_byte(number as u8),
            block_number: number,
            block_timestamp: 1_000 + number,
            log_index: index,
            address,
            event_sig: sig,
            topics: vec![sig, B256::with_last_byte(index as u8)],
            tx_hash: B256::repeat_byte(number as u8),
            ..Default::default()
        }
    }

    fn addr() -> Address {
        Address::repeat_byte(0x11)
    }

    fn sig(n: u8) -> B256 {
        B256::repeat_byte(n)
    }

    #[test]
    fn test_create_and_open_db() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db_path = tmp_dir.path().join("chaindb");
        let db = ChainDb::new(CHAIN_ID, &db_path);
        assert!(db.is_ok(), "Should create or open database");
    }

    #[test]
    fn test_basic_ingest() {
        let (_dir, db) = setup_db();
        let logs = vec![log(10, 0, addr(), sig(1)), log(10, 1, addr(), sig(1))];
        db.insert_logs_with_block(&logs, &block(10, 5)).unwrap();

        let latest = db.latest_block().unwrap().unwrap();
        assert_eq!(latest.block_number, 10);
        assert!(latest.created_at > 0);

        let stored = db.select_logs(10, 10, addr(), sig(1)).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].log_index, 0);
        assert_eq!(stored[1].log_index, 1);

        // Re-inserting is a no-op.
        db.insert_logs_with_block(&logs, &block(10, 5)).unwrap();
        assert_eq!(db.select_logs_by_block_range(0, 100).unwrap().len(), 2);
    }

    #[test]
    fn test_rejects_foreign_chain() {
        let (_dir, db) = setup_db();
        let mut foreign = log(1, 0, addr(), sig(1));
        foreign.chain_id = 1;
        let err = db.insert_logs_with_block(&[foreign], &block(1, 0)).unwrap_err();
        assert!(matches!(err, StorageError::ChainIdMismatch { expected: CHAIN_ID, got: 1 }));
        assert!(db.latest_block().unwrap().is_none());
    }

    #[test]
    fn test_timeout_aborts_whole_transaction() {
        let (_dir, db) = setup_db();
        let db = db.with_batch_config(BatchConfig {
            statement_timeout: Some(Duration::ZERO),
            ..Default::default()
        });
        let logs: Vec<_> = (0..4001).map(|i| log(7, i, addr(), sig(1))).collect();

        let err = db.insert_logs_with_block(&logs, &block(7, 0)).unwrap_err();
        assert!(err.is_timeout());
        assert!(db.latest_block().unwrap().is_none());
        assert!(db.select_logs_by_block_range(0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_bulk_insert_of_4001_logs() {
        let (_dir, db) = setup_db();
        let logs: Vec<_> = (0..4001).map(|i| log(7, i, addr(), sig(1))).collect();
        db.insert_logs_with_block(&logs, &block(7, 0)).unwrap();

        let stored = db.select_logs(7, 7, addr(), sig(1)).unwrap();
        assert_eq!(stored.len(), 4001);
        assert!(stored.windows(2).all(|w| w[0].log_index < w[1].log_index));
    }

    #[test]
    fn test_delete_logs_and_blocks_after() {
        let (_dir, db) = setup_db();
        for n in 1..=5 {
            db.insert_logs_with_block(&[log(n, 0, addr(), sig(1))], &block(n, 0)).unwrap();
        }
        db.delete_logs_and_blocks_after(3).unwrap();

        assert_eq!(db.latest_block().unwrap().unwrap().block_number, 2);
        assert!(db.block_by_hash(B256::with_last_byte(4)).unwrap().is_none());
        let left: Vec<_> =
            db.select_logs(0, 10, addr(), sig(1)).unwrap().iter().map(|l| l.block_number).collect();
        assert_eq!(left, vec![1, 2]);
    }

    #[test]
    fn test_confirmations() {
        let (_dir, db) = setup_db();
        for n in 1..=10 {
            db.insert_logs_with_block(&[log(n, 0, addr(), sig(1))], &block(n, 4)).unwrap();
        }

        let finalized = db
            .select_logs_created_after(addr(), sig(1), 0, Confirmations::Finalized)
            .unwrap();
        assert_eq!(finalized.last().unwrap().block_number, 4);

        let deep = db.select_logs_created_after(addr(), sig(1), 0, Confirmations::Depth(3)).unwrap();
        assert_eq!(deep.last().unwrap().block_number, 7);

        let latest = db
            .select_latest_log_by_event_sig_with_confs(sig(1), addr(), Confirmations::Depth(1))
            .unwrap()
            .unwrap();
        assert_eq!(latest.block_number, 9);

        let block = db
            .select_latest_block_by_event_sigs_addrs_with_confs(
                0,
                &[sig(1), sig(2)],
                &[addr()],
                Confirmations::Depth(2),
            )
            .unwrap();
        assert_eq!(block, 8);

        let none = db
            .select_latest_block_by_event_sigs_addrs_with_confs(
                20,
                &[sig(1)],
                &[addr()],
                Confirmations::UNCONFIRMED,
            )
            .unwrap();
        assert_eq!(none, 0);
    }

    #[test]
    fn test_select_latest_log_per_pair() {
        let (_dir, db) = setup_db();
        let other = Address::repeat_byte(0x22);
        db.insert_logs_with_block(&[log(1, 0, addr(), sig(1))], &block(1, 0)).unwrap();
        db.insert_logs_with_block(
            &[log(2, 0, other, sig(1)), log(2, 1, addr(), sig(1)), log(2, 2, addr(), sig(1))],
            &block(2, 0),
        )
        .unwrap();
        db.insert_logs_with_block(&[log(3, 0, other, sig(2))], &block(3, 0)).unwrap();

        let logs = db
            .select_latest_log_event_sigs_addrs_with_confs(
                0,
                &[addr(), other],
                &[sig(1)],
                Confirmations::UNCONFIRMED,
            )
            .unwrap();
        let ids: Vec<_> = logs.iter().map(|l| (l.block_number, l.log_index)).collect();
        assert_eq!(ids, vec![(2, 0), (2, 1), (2, 2)]);
    }

    #[test]
    fn test_indexed_and_word_queries() {
        let (_dir, db) = setup_db();
        let mut logs: Vec<_> = (0..4).map(|i| log(1, i, addr(), sig(1))).collect();
        for (i, l) in logs.iter_mut().enumerate() {
            let mut data = vec![0u8; 64];
            data[31] = i as u8 * 10;
            data[63] = i as u8 * 10 + 5;
            l.data = data.into();
        }
        db.insert_logs_with_block(&logs, &block(1, 0)).unwrap();
        let topic = TopicIndex::new(1).unwrap();
        let confs = Confirmations::UNCONFIRMED;

        let indexed = db
            .select_indexed_logs(
                addr(),
                sig(1),
                topic,
                &[B256::with_last_byte(1), B256::with_last_byte(3)],
                confs,
            )
            .unwrap();
        assert_eq!(indexed.iter().map(|l| l.log_index).collect::<Vec<_>>(), vec![1, 3]);

        let gt = db
            .select_indexed_logs_topic_greater_than(addr(), sig(1), topic, B256::with_last_byte(2), confs)
            .unwrap();
        assert_eq!(gt.len(), 2);

        let range = db
            .select_indexed_logs_topic_range(
                addr(),
                sig(1),
                topic,
                B256::with_last_byte(1),
                B256::with_last_byte(2),
                confs,
            )
            .unwrap();
        assert_eq!(range.len(), 2);

        let words = db
            .select_logs_data_word_range(
                addr(),
                sig(1),
                0,
                B256::with_last_byte(10),
                B256::with_last_byte(20),
                confs,
            )
            .unwrap();
        assert_eq!(words.iter().map(|l| l.log_index).collect::<Vec<_>>(), vec![1, 2]);

        let above = db
            .select_logs_data_word_greater_than(addr(), sig(1), 0, B256::with_last_byte(30), confs)
            .unwrap();
        assert_eq!(above.len(), 1);

        let between = db
            .select_logs_data_word_between(addr(), sig(1), 0, 1, B256::with_last_byte(23), confs)
            .unwrap();
        assert_eq!(between.iter().map(|l| l.log_index).collect::<Vec<_>>(), vec![2]);

        let by_tx = db
            .select_indexed_logs_by_tx_hash(addr(), sig(1), B256::repeat_byte(1))
            .unwrap();
        assert_eq!(by_tx.len(), 4);
    }

    #[test]
    fn test_select_indexed_logs_with_sigs_excluding() {
        let (_dir, db) = setup_db();
        // sig 1 requests with topic ids 0..3, sig 2 fulfils id 1
        let mut logs: Vec<_> = (0..3).map(|i| log(1, i, addr(), sig(1))).collect();
        let mut fulfilled = log(2, 0, addr(), sig(2));
        fulfilled.topics[1] = B256::with_last_byte(1);
        logs.push(fulfilled);
        db.insert_logs(&logs).unwrap();
        db.insert_block(&block(2, 0)).unwrap();

        let pending = db
            .select_indexed_logs_with_sigs_excluding(
                sig(1),
                sig(2),
                TopicIndex::new(1).unwrap(),
                addr(),
                0,
                10,
                Confirmations::UNCONFIRMED,
            )
            .unwrap();
        assert_eq!(pending.iter().map(|l| l.log_index).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_delete_expired_logs_respects_pinning() {
        let (_dir, db) = setup_db();
        let pinned = Address::repeat_byte(0x22);
        db.insert_filter(
            &Filter::new("short", [addr(), pinned], [sig(1)]).with_retention(Duration::from_secs(1)),
        )
        .unwrap();
        db.insert_filter(&Filter::new("forever", [pinned], [sig(1)])).unwrap();

        // Block timestamps around 1000 are far in the past.
        db.insert_logs_with_block(
            &[log(1, 0, addr(), sig(1)), log(1, 1, pinned, sig(1)), log(1, 2, addr(), sig(2))],
            &block(1, 0),
        )
        .unwrap();

        assert_eq!(db.delete_expired_logs(0).unwrap(), 1);
        let left: Vec<_> =
            db.select_logs_by_block_range(0, 10).unwrap().iter().map(|l| l.log_index).collect();
        assert_eq!(left, vec![1, 2]);
    }

    #[test]
    fn test_delete_blocks_before_with_limit() {
        let (_dir, db) = setup_db();
        for n in 1..=6 {
            db.insert_block(&block(n, 0)).unwrap();
        }
        assert_eq!(db.delete_blocks_before(4, 3).unwrap(), 3);
        assert_eq!(db.delete_blocks_before(4, 0).unwrap(), 1);
        assert_eq!(db.blocks_range(0, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_filter_registry() {
        let (_dir, db) = setup_db();
        db.insert_filter(&Filter::new("a", [addr()], [sig(1)])).unwrap();
        db.insert_filter(&Filter::new("a", [addr()], [sig(2)])).unwrap();
        db.insert_filter(&Filter::new("b", [addr()], [sig(3)])).unwrap();

        let filters = db.load_filters().unwrap();
        assert_eq!(filters["a"].event_sigs, vec![sig(1), sig(2)]);

        db.delete_filter("a").unwrap();
        let filters = db.load_filters().unwrap();
        assert!(!filters.contains_key("a"));
        assert!(filters.contains_key("b"));
    }
}
