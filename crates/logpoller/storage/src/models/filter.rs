//! Models for storing registered filters.

use alloy_primitives::{Address, B256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use logpoller_types::Filter;
use reth_db_api::table::Table;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A filter as stored in the [`Filters`] table, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, RlpEncodable, RlpDecodable)]
pub struct FilterRecord {
    /// Watched addresses.
    pub addresses: Vec<Address>,
    /// Watched event signatures.
    pub event_sigs: Vec<B256>,
    /// Topic 1 constraint.
    pub topic2: Vec<B256>,
    /// Topic 2 constraint.
    pub topic3: Vec<B256>,
    /// Topic 3 constraint.
    pub topic4: Vec<B256>,
    /// Retention in milliseconds, zero keeps forever.
    pub retention_ms: u64,
    /// Maximum logs kept.
    pub max_logs_kept: u64,
    /// Logs per block limit.
    pub logs_per_block: u64,
}

impl From<&Filter> for FilterRecord {
    fn from(filter: &Filter) -> Self {
        Self {
            addresses: filter.addresses.clone(),
            event_sigs: filter.event_sigs.clone(),
            topic2: filter.topic2.clone(),
            topic3: filter.topic3.clone(),
            topic4: filter.topic4.clone(),
            retention_ms: u64::try_from(filter.retention.as_millis()).unwrap_or(u64::MAX),
            max_logs_kept: filter.max_logs_kept,
            logs_per_block: filter.logs_per_block,
        }
    }
}

impl FilterRecord {
    /// Rebuilds the domain filter named `name`.
    pub fn into_filter(self, name: String) -> Filter {
        Filter {
            name,
            addresses: self.addresses,
            event_sigs: self.event_sigs,
            topic2: self.topic2,
            topic3: self.topic3,
            topic4: self.topic4,
            retention: Duration::from_millis(self.retention_ms),
            max_logs_kept: self.max_logs_kept,
            logs_per_block: self.logs_per_block,
        }
    }
}

/// Registered filters by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Filters;

impl Table for Filters {
    const NAME: &'static str = "filters";
    const DUPSORT: bool = false;

    type Key = String;
    type Value = FilterRecord;
}
