//! Provider for processed blocks.

use crate::{
    StorageError,
    models::{BlockHashes, BlockRecord, Blocks},
};
use alloy_primitives::B256;
use reth_db_api::{
    cursor::DbCursorRO,
    transaction::{DbTx, DbTxMut},
};
use tracing::{debug, error};

/// Block storage over a transactional reference.
#[derive(Debug)]
pub(crate) struct BlockProvider<'tx, TX> {
    tx: &'tx TX,
}

impl<'tx, TX> BlockProvider<'tx, TX> {
    pub(crate) const fn new(tx: &'tx TX) -> Self {
        Self { tx }
    }
}

impl<TX> BlockProvider<'_, TX>
where
    TX: DbTx,
{
    pub(crate) fn block(&self, number: u64) -> Result<Option<BlockRecord>, StorageError> {
        Ok(self.tx.get::<Blocks>(number)?)
    }

    pub(crate) fn block_by_hash(
        &self,
        hash: B256,
    ) -> Result<Option<(u64, BlockRecord)>, StorageError> {
        let Some(number) = self.tx.get::<BlockHashes>(hash)? else {
            return Ok(None);
        };
        Ok(self.block(number)?.filter(|record| record.hash == hash).map(|record| (number, record)))
    }

    pub(crate) fn latest_block(&self) -> Result<Option<(u64, BlockRecord)>, StorageError> {
        let mut cursor = self.tx.cursor_read::<Blocks>().inspect_err(|err| {
            error!(target: "logpoller_storage", %err, "Failed to open blocks cursor");
        })?;
        Ok(cursor.last()?)
    }

    /// Returns the stored blocks with heights in `start..=end`, ascending.
    pub(crate) fn blocks_in_range(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<(u64, BlockRecord)>, StorageError> {
        if start > end {
            return Ok(Vec::new());
        }
        let mut cursor = self.tx.cursor_read::<Blocks>()?;
        let blocks = cursor.walk_range(start..=end)?.collect::<Result<Vec<_>, _>>()?;
        Ok(blocks)
    }
}

impl<TX> BlockProvider<'_, TX>
where
    TX: DbTxMut + DbTx,
{
    /// Stores a block unless its height is already taken. Returns `true` if it was written.
    pub(crate) fn insert_block(
        &self,
        number: u64,
        record: BlockRecord,
    ) -> Result<bool, StorageError> {
        if let Some(existing) = self.block(number)? {
            if existing.hash != record.hash {
                debug!(
                    target: "logpoller_storage",
                    block_number = number,
                    existing = %existing.hash,
                    incoming = %record.hash,
                    "Block height already stored with a different hash, keeping existing"
                );
            }
            return Ok(false);
        }
        self.tx.put::<Blocks>(number, record).inspect_err(|err| {
            error!(target: "logpoller_storage", block_number = number, %err, "Failed to store block");
        })?;
        self.tx.put::<BlockHashes>(record.hash, number)?;
        Ok(true)
    }

    /// Deletes every block at or above `start`. Returns the number of blocks removed.
    pub(crate) fn delete_blocks_from(&self, start: u64) -> Result<usize, StorageError> {
        let mut cursor = self.tx.cursor_read::<Blocks>()?;
        let doomed = cursor.walk_range(start..)?.collect::<Result<Vec<_>, _>>()?;
        self.delete_blocks(&doomed)
    }

    /// Deletes blocks at or below `end`, oldest first, at most `limit` of them when `limit > 0`.
    pub(crate) fn delete_blocks_up_to(&self, end: u64, limit: usize) -> Result<usize, StorageError> {
        let mut cursor = self.tx.cursor_read::<Blocks>()?;
        let walker = cursor.walk_range(..=end)?;
        let limit = if limit > 0 { limit } else { usize::MAX };
        let doomed = walker.take(limit).collect::<Result<Vec<_>, _>>()?;
        self.delete_blocks(&doomed)
    }

    fn delete_blocks(&self, blocks: &[(u64, BlockRecord)]) -> Result<usize, StorageError> {
        for (number, record) in blocks {
            self.tx.delete::<Blocks>(*number, None)?;
            self.tx.delete::<BlockHashes>(record.hash, None)?;
        }
        Ok(blocks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tables;
    use reth_db::{
        DatabaseEnv,
        mdbx::{DatabaseArguments, init_db_for},
    };
    use reth_db_api::Database;
    use tempfile::TempDir;

    fn setup_db() -> (TempDir, DatabaseEnv) {
        let temp_dir = TempDir::new().expect("Could not create temp dir");
        let env = init_db_for::<_, Tables>(temp_dir.path(), DatabaseArguments::default())
            .expect("Failed to init database");
        (temp_dir, env)
    }

    fn record(n: u8) -> BlockRecord {
        BlockRecord { hash: B256::repeat_byte(n), timestamp: n as u64, ..Default::default() }
    }

    #[test]
    fn test_insert_block_is_first_writer_wins() {
        let (_dir, db) = setup_db();
        let tx = db.tx_mut().expect("Failed to create write transaction");
        let provider = BlockProvider::new(&tx);

        assert!(provider.insert_block(10, record(1)).unwrap());
        assert!(!provider.insert_block(10, record(2)).unwrap());
        tx.commit().expect("Failed to commit");

        let tx = db.tx().expect("Failed to create read transaction");
        let provider = BlockProvider::new(&tx);
        assert_eq!(provider.block(10).unwrap(), Some(record(1)));
        assert_eq!(provider.block_by_hash(B256::repeat_byte(1)).unwrap(), Some((10, record(1))));
        assert_eq!(provider.block_by_hash(B256::repeat_byte(2)).unwrap(), None);
    }

    #[test]
    fn test_delete_ranges() {
        let (_dir, db) = setup_db();
        let tx = db.tx_mut().expect("Failed to create write transaction");
        let provider = BlockProvider::new(&tx);
        for n in 1..=10u8 {
            provider.insert_block(n as u64, record(n)).unwrap();
        }

        assert_eq!(provider.delete_blocks_up_to(5, 2).unwrap(), 2);
        assert_eq!(provider.blocks_in_range(0, 10).unwrap().first().map(|(n, _)| *n), Some(3));

        assert_eq!(provider.delete_blocks_from(8).unwrap(), 3);
        assert_eq!(provider.latest_block().unwrap().map(|(n, _)| n), Some(7));
        assert_eq!(provider.block_by_hash(B256::repeat_byte(9)).unwrap(), None);

        assert_eq!(provider.delete_blocks_up_to(5, 0).unwrap(), 3);
        assert_eq!(provider.blocks_in_range(0, 10).unwrap().len(), 2);
    }
}
