use alloy_primitives::{Address, B256};
use logpoller_types::{Log, UpkeepId};
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, PoisonError, RwLock},
};

/// The log filter of a log-triggered upkeep, together with its recovery cursor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpkeepFilter {
    /// The upkeep the filter belongs to.
    pub upkeep_id: UpkeepId,
    /// Emitting contract.
    pub address: Address,
    /// Event signature (topic0).
    pub event_sig: B256,
    /// Expected values of topics 1 to 3.
    pub topics: [B256; 3],
    /// Bit `i` set means topic `i + 1` must equal `topics[i]`.
    pub selector: u8,
    /// Block at which the upkeep trigger config was last updated.
    pub config_update_block: u64,
    /// Last block scanned by the recoverer for this upkeep.
    pub last_repoll_block: u64,
}

impl UpkeepFilter {
    /// Returns `true` if `log` triggers the upkeep.
    pub fn matches(&self, log: &Log) -> bool {
        log.address == self.address &&
            log.event_sig == self.event_sig &&
            self.topics.iter().enumerate().all(|(i, expected)| {
                self.selector & (1 << i) == 0 || log.topics.get(i + 1) == Some(expected)
            })
    }

    /// Keeps the logs triggering the upkeep.
    pub fn select(&self, logs: Vec<Log>) -> Vec<Log> {
        logs.into_iter().filter(|log| self.matches(log)).collect()
    }
}

/// Registry of the active upkeep filters.
///
/// Readers see a consistent snapshot; updates never block on readers holding one.
pub trait UpkeepFilterStore: Debug + Send + Sync {
    /// Returns the filters satisfying `predicate`.
    fn filters(&self, predicate: &dyn Fn(&UpkeepFilter) -> bool) -> Vec<UpkeepFilter>;

    /// Returns the filter of `upkeep_id`.
    fn filter(&self, upkeep_id: &UpkeepId) -> Option<UpkeepFilter>;

    /// Returns `true` if `upkeep_id` has a filter.
    fn has(&self, upkeep_id: &UpkeepId) -> bool {
        self.filter(upkeep_id).is_some()
    }

    /// Adds or replaces filters. A replaced filter keeps the highest recovery cursor.
    fn upsert(&self, filters: Vec<UpkeepFilter>);

    /// Removes the filters of `upkeep_ids`.
    fn remove(&self, upkeep_ids: &[UpkeepId]);

    /// Moves the recovery cursor of `upkeep_id` forward to `block`. The cursor never moves back.
    fn update_last_repoll_block(&self, upkeep_id: &UpkeepId, block: u64);

    /// Returns the number of filters.
    fn len(&self) -> usize;

    /// Returns `true` if no filter is registered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Copy-on-write, in-memory [`UpkeepFilterStore`].
#[derive(Debug, Default)]
pub struct InMemoryUpkeepFilterStore {
    filters: RwLock<Arc<HashMap<UpkeepId, UpkeepFilter>>>,
}

impl InMemoryUpkeepFilterStore {
    fn snapshot(&self) -> Arc<HashMap<UpkeepId, UpkeepFilter>> {
        self.filters.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn modify(&self, f: impl FnOnce(&mut HashMap<UpkeepId, UpkeepFilter>)) {
        let mut guard = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = HashMap::clone(&guard);
        f(&mut next);
        *guard = Arc::new(next);
    }
}

impl UpkeepFilterStore for InMemoryUpkeepFilterStore {
    fn filters(&self, predicate: &dyn Fn(&UpkeepFilter) -> bool) -> Vec<UpkeepFilter> {
        self.snapshot().values().filter(|f| predicate(f)).cloned().collect()
    }

    fn filter(&self, upkeep_id: &UpkeepId) -> Option<UpkeepFilter> {
        self.snapshot().get(upkeep_id).cloned()
    }

    fn upsert(&self, filters: Vec<UpkeepFilter>) {
        self.modify(|current| {
            for mut filter in filters {
                if let Some(existing) = current.get(&filter.upkeep_id) {
                    filter.last_repoll_block = filter.last_repoll_block.max(existing.last_repoll_block);
                }
                current.insert(filter.upkeep_id, filter);
            }
        });
    }

    fn remove(&self, upkeep_ids: &[UpkeepId]) {
        self.modify(|current| {
            for id in upkeep_ids {
                current.remove(id);
            }
        });
    }

    fn update_last_repoll_block(&self, upkeep_id: &UpkeepId, block: u64) {
        self.modify(|current| {
            if let Some(filter) = current.get_mut(upkeep_id) {
                filter.last_repoll_block = filter.last_repoll_block.max(block);
            }
        });
    }

    fn len(&self) -> usize {
        self.snapshot().len()
    }
}
