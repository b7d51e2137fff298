//! Provider for registered filters.

use crate::{
    StorageError,
    models::{FilterRecord, Filters},
};
use logpoller_types::Filter;
use reth_db_api::{
    cursor::DbCursorRO,
    transaction::{DbTx, DbTxMut},
};
use std::collections::BTreeMap;
use tracing::debug;

/// Filter storage over a transactional reference.
#[derive(Debug)]
pub(crate) struct FilterProvider<'tx, TX> {
    tx: &'tx TX,
}

impl<'tx, TX> FilterProvider<'tx, TX> {
    pub(crate) const fn new(tx: &'tx TX) -> Self {
        Self { tx }
    }
}

impl<TX> FilterProvider<'_, TX>
where
    TX: DbTx,
{
    pub(crate) fn filter(&self, name: &str) -> Result<Option<Filter>, StorageError> {
        let record = self.tx.get::<Filters>(name.to_string())?;
        Ok(record.map(|record| record.into_filter(name.to_string())))
    }

    pub(crate) fn filters(&self) -> Result<BTreeMap<String, Filter>, StorageError> {
        let mut cursor = self.tx.cursor_read::<Filters>()?;
        let mut filters = BTreeMap::new();
        for row in cursor.walk(None)? {
            let (name, record) = row?;
            filters.insert(name.clone(), record.into_filter(name));
        }
        Ok(filters)
    }
}

impl<TX> FilterProvider<'_, TX>
where
    TX: DbTxMut + DbTx,
{
    /// Stores `filter`, merging it into an existing filter of the same name.
    pub(crate) fn upsert_filter(&self, filter: &Filter) -> Result<Filter, StorageError> {
        let merged = match self.filter(&filter.name)? {
            Some(mut existing) => {
                existing.merge(filter);
                existing
            }
            None => filter.clone(),
        };
        debug!(
            target: "logpoller_storage",
            name = %merged.name,
            addresses = merged.addresses.len(),
            event_sigs = merged.event_sigs.len(),
            "Storing filter"
        );
        self.tx.put::<Filters>(merged.name.clone(), FilterRecord::from(&merged))?;
        Ok(merged)
    }

    /// Deletes the filter named `name`. Returns `true` if it existed.
    pub(crate) fn delete_filter(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.tx.delete::<Filters>(name.to_string(), None)?)
    }
}
