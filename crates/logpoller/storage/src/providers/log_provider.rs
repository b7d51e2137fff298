//! Provider for ingested logs and their `(address, event_sig)` index.

use crate::{
    StorageError,
    models::{EventLogKey, EventLogs, LogKey, LogRecord, Logs},
    providers::BlockProvider,
    query::LogQuery,
};
use alloy_primitives::{Address, B256, ChainId};
use logpoller_types::Log;
use reth_db_api::{
    cursor::DbCursorRO,
    transaction::{DbTx, DbTxMut},
};
use std::collections::BTreeSet;
use tracing::{error, trace};

/// Log storage over a transactional reference.
#[derive(Debug)]
pub(crate) struct LogProvider<'tx, TX> {
    tx: &'tx TX,
    chain_id: ChainId,
}

impl<'tx, TX> LogProvider<'tx, TX> {
    pub(crate) const fn new(tx: &'tx TX, chain_id: ChainId) -> Self {
        Self { tx, chain_id }
    }
}

impl<TX> LogProvider<'_, TX>
where
    TX: DbTx,
{
    /// Runs `query`, returning logs ordered by `(block_number, log_index)`.
    ///
    /// Confirmations are resolved against the latest stored block. With no stored block a
    /// confirmation bounded query returns nothing.
    pub(crate) fn select(&self, query: &LogQuery) -> Result<Vec<Log>, StorageError> {
        let Some(to_block) = self.upper_bound(query)? else {
            return Ok(Vec::new());
        };
        if query.from_block > to_block {
            return Ok(Vec::new());
        }

        if query.addresses.is_empty() || query.event_sigs.is_empty() {
            return self.scan(query.from_block, to_block, query);
        }

        let addresses: BTreeSet<_> = query.addresses.iter().copied().collect();
        let event_sigs: BTreeSet<_> = query.event_sigs.iter().copied().collect();
        let mut logs = Vec::new();
        for address in &addresses {
            for event_sig in &event_sigs {
                for key in self.event_keys(*address, *event_sig, query.from_block, to_block)? {
                    let log = self.log(key.log_key())?;
                    if query.matches(&log) {
                        logs.push(log);
                    }
                }
            }
        }
        logs.sort_by_key(|log| (log.block_number, log.log_index, log.block_hash));
        Ok(logs)
    }

    /// Returns the index keys of `(address, event_sig)` logs in `from..=to`.
    pub(crate) fn event_keys(
        &self,
        address: Address,
        event_sig: B256,
        from: u64,
        to: u64,
    ) -> Result<Vec<EventLogKey>, StorageError> {
        let start = EventLogKey::first_at(address, event_sig, from);
        let end = EventLogKey::last_at(address, event_sig, to);
        let mut cursor = self.tx.cursor_read::<EventLogs>()?;
        let keys = cursor
            .walk_range(start..=end)?
            .map(|row| row.map(|(key, _)| key))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn log(&self, key: LogKey) -> Result<Log, StorageError> {
        let record = self.tx.get::<Logs>(key)?.ok_or_else(|| {
            error!(
                target: "logpoller_storage",
                block_number = key.block_number,
                log_index = key.log_index,
                "Indexed log missing from logs table"
            );
            StorageError::EntryNotFound(format!(
                "log {} at block {}",
                key.log_index, key.block_number
            ))
        })?;
        Ok(record.into_log(self.chain_id, key))
    }

    fn scan(&self, from: u64, to: u64, query: &LogQuery) -> Result<Vec<Log>, StorageError> {
        let mut cursor = self.tx.cursor_read::<Logs>()?;
        let mut logs = Vec::new();
        for row in cursor.walk_range(LogKey::first_at(from)..=LogKey::last_at(to))? {
            let (key, record) = row?;
            let log = record.into_log(self.chain_id, key);
            if query.matches(&log) {
                logs.push(log);
            }
        }
        Ok(logs)
    }

    fn upper_bound(&self, query: &LogQuery) -> Result<Option<u64>, StorageError> {
        let Some(confs) = query.confirmations else {
            return Ok(Some(query.to_block));
        };
        let latest = BlockProvider::new(self.tx).latest_block()?;
        Ok(latest.map(|(number, record)| {
            let latest = record.into_block(self.chain_id, number);
            query.to_block.min(confs.resolve(&latest))
        }))
    }
}

impl<TX> LogProvider<'_, TX>
where
    TX: DbTxMut + DbTx,
{
    /// Stores the logs that are not stored yet, stamped with `created_at`. Returns the number of
    /// logs written.
    pub(crate) fn insert_logs(&self, logs: &[Log], created_at: u64) -> Result<usize, StorageError> {
        let mut inserted = 0;
        for log in logs {
            let key = LogKey::from(log);
            if self.tx.get::<Logs>(key)?.is_some() {
                trace!(
                    target: "logpoller_storage",
                    block_number = log.block_number,
                    log_index = log.log_index,
                    "Log already stored, skipping"
                );
                continue;
            }
            let record = LogRecord { created_at, ..LogRecord::from(log) };
            self.tx.put::<Logs>(key, record).inspect_err(|err| {
                error!(
                    target: "logpoller_storage",
                    block_number = log.block_number,
                    log_index = log.log_index,
                    %err,
                    "Failed to store log"
                );
            })?;
            self.tx.put::<EventLogs>(EventLogKey::from(log), log.block_timestamp)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Deletes every log at or above `start`. Returns the number of logs removed.
    pub(crate) fn delete_logs_from(&self, start: u64) -> Result<usize, StorageError> {
        let mut cursor = self.tx.cursor_read::<Logs>()?;
        let doomed = cursor
            .walk_range(LogKey::first_at(start)..)?
            .map(|row| {
                row.map(|(key, record)| EventLogKey {
                    address: record.address,
                    event_sig: record.event_sig,
                    block_number: key.block_number,
                    log_index: key.log_index,
                    block_hash: key.block_hash,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.delete_indexed(&doomed)
    }

    /// Deletes the given logs from both the logs table and the index.
    pub(crate) fn delete_indexed(&self, keys: &[EventLogKey]) -> Result<usize, StorageError> {
        for key in keys {
            self.tx.delete::<Logs>(key.log_key(), None)?;
            self.tx.delete::<EventLogs>(*key, None)?;
        }
        Ok(keys.len())
    }

    /// Deletes `(address, event_sig)` logs whose block timestamp is at or before `cutoff`, at most
    /// `limit` of them. Returns the number of logs removed.
    pub(crate) fn delete_event_logs_before(
        &self,
        address: Address,
        event_sig: B256,
        cutoff: u64,
        limit: usize,
    ) -> Result<usize, StorageError> {
        let start = EventLogKey::first_at(address, event_sig, 0);
        let end = EventLogKey::last_at(address, event_sig, u64::MAX);
        let mut cursor = self.tx.cursor_read::<EventLogs>()?;
        let mut doomed = Vec::new();
        for row in cursor.walk_range(start..=end)? {
            if doomed.len() >= limit {
                break;
            }
            let (key, block_timestamp) = row?;
            if block_timestamp <= cutoff {
                doomed.push(key);
            }
        }
        self.delete_indexed(&doomed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::Tables, query::LogPredicate};
    use logpoller_types::TopicIndex;
    use reth_db::{
        DatabaseEnv,
        mdbx::{DatabaseArguments, init_db_for},
    };
    use reth_db_api::Database;
    use tempfile::TempDir;

    const CHAIN_ID: ChainId = 1;

    fn setup_db() -> (TempDir, DatabaseEnv) {
        let temp_dir = TempDir::new().expect("Could not create temp dir");
        let env = init_db_for::<_, Tables>(temp_dir.path(), DatabaseArguments::default())
            .expect("Failed to init database");
        (temp_dir, env)
    }

    fn log(block_number: u64, log_index: u64, address: Address, sig: B256) -> Log {
        Log {
            chain_id: CHAIN_ID,
            block_hash: B256::with_last_byte(block_number as u8),
            block_number,
            block_timestamp: block_number * 10,
            log_index,
            address,
            event_sig: sig,
            topics: vec![sig, B256::with_last_byte(log_index as u8)],
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_is_idempotent_and_ordered() {
        let (_dir, db) = setup_db();
        let a = Address::repeat_byte(0xa);
        let b = Address::repeat_byte(0xb);
        let sig = B256::repeat_byte(1);
        let logs = vec![log(2, 0, a, sig), log(1, 1, b, sig), log(1, 0, a, sig)];

        let tx = db.tx_mut().expect("Failed to create write transaction");
        let provider = LogProvider::new(&tx, CHAIN_ID);
        assert_eq!(provider.insert_logs(&logs, 0).unwrap(), 3);
        assert_eq!(provider.insert_logs(&logs, 0).unwrap(), 0);
        tx.commit().expect("Failed to commit");

        let tx = db.tx().expect("Failed to create read transaction");
        let provider = LogProvider::new(&tx, CHAIN_ID);

        let all = provider.select(&LogQuery::default()).unwrap();
        let order: Vec<_> = all.iter().map(|l| (l.block_number, l.log_index)).collect();
        assert_eq!(order, vec![(1, 0), (1, 1), (2, 0)]);

        let indexed = provider
            .select(&LogQuery {
                addresses: vec![a, b],
                event_sigs: vec![sig],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(indexed, all);
    }

    #[test]
    fn test_select_with_predicate_and_confirmations() {
        let (_dir, db) = setup_db();
        let a = Address::repeat_byte(0xa);
        let sig = B256::repeat_byte(1);

        let tx = db.tx_mut().expect("Failed to create write transaction");
        let provider = LogProvider::new(&tx, CHAIN_ID);
        provider.insert_logs(&[log(5, 0, a, sig), log(5, 1, a, sig), log(9, 1, a, sig)], 0).unwrap();

        // Without any stored block a confirmation bounded query is empty.
        let query = LogQuery::event(a, sig).confirmations(logpoller_types::Confirmations::Depth(2));
        assert!(provider.select(&query).unwrap().is_empty());

        BlockProvider::new(&tx)
            .insert_block(10, crate::models::BlockRecord::default())
            .unwrap();
        let confirmed = provider.select(&query).unwrap();
        assert_eq!(confirmed.len(), 2);

        let topic = TopicIndex::new(1).unwrap();
        let filtered = provider
            .select(&query.filter(LogPredicate::TopicIn {
                index: topic,
                values: vec![B256::with_last_byte(1)],
            }))
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].log_index, 1);
    }

    #[test]
    fn test_delete_logs_from_removes_index_entries() {
        let (_dir, db) = setup_db();
        let a = Address::repeat_byte(0xa);
        let sig = B256::repeat_byte(1);

        let tx = db.tx_mut().expect("Failed to create write transaction");
        let provider = LogProvider::new(&tx, CHAIN_ID);
        provider.insert_logs(&[log(1, 0, a, sig), log(2, 0, a, sig), log(3, 0, a, sig)], 0).unwrap();

        assert_eq!(provider.delete_logs_from(2).unwrap(), 2);
        assert_eq!(provider.event_keys(a, sig, 0, u64::MAX).unwrap().len(), 1);
        assert_eq!(provider.select(&LogQuery::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_event_logs_before_honours_limit() {
        let (_dir, db) = setup_db();
        let a = Address::repeat_byte(0xa);
        let sig = B256::repeat_byte(1);

        let tx = db.tx_mut().expect("Failed to create write transaction");
        let provider = LogProvider::new(&tx, CHAIN_ID);
        let logs: Vec<_> = (1..=5).map(|n| log(n, 0, a, sig)).collect();
        provider.insert_logs(&logs, 0).unwrap();

        // timestamps are 10..=50; cutoff 30 selects three logs
        assert_eq!(provider.delete_event_logs_before(a, sig, 30, 2).unwrap(), 2);
        assert_eq!(provider.delete_event_logs_before(a, sig, 30, usize::MAX).unwrap(), 1);
        let left: Vec<_> =
            provider.select(&LogQuery::default()).unwrap().iter().map(|l| l.block_number).collect();
        assert_eq!(left, vec![4, 5]);
    }
}
