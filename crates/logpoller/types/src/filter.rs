use crate::Log;
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, time::Duration};
use thiserror::Error;

/// Upper bound on the number of values accepted for a single topic constraint.
pub const MAX_TOPIC_VALUES: usize = 256;

/// A named, persistent log filter.
///
/// Every log matching any `(address, event_sig)` pair of a registered filter is ingested. The
/// optional topic constraints narrow that set: an empty constraint matches any value, otherwise
/// the corresponding topic must equal one of the listed values.
///
/// Filters sharing a name are merged: sets are unioned and numeric settings take the maximum.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Filter {
    /// Unique name of the filter within a chain.
    pub name: String,
    /// Contract addresses to watch.
    pub addresses: Vec<Address>,
    /// Event signatures (topic0) to watch.
    pub event_sigs: Vec<B256>,
    /// Allowed values of topic 1.
    pub topic2: Vec<B256>,
    /// Allowed values of topic 2.
    pub topic3: Vec<B256>,
    /// Allowed values of topic 3.
    pub topic4: Vec<B256>,
    /// How long matching logs are retained. Zero keeps them forever.
    pub retention: Duration,
    /// Maximum number of logs the owner wants kept, zero for no limit.
    ///
    /// Stored and merged with the filter for callers, retention only looks at `retention`.
    pub max_logs_kept: u64,
    /// Expected number of matching logs per block, zero for no limit.
    ///
    /// Stored and merged with the filter for callers, ingestion does not rate limit.
    pub logs_per_block: u64,
}

impl Filter {
    /// Creates a new filter over the given addresses and event signatures.
    pub fn new(
        name: impl Into<String>,
        addresses: impl IntoIterator<Item = Address>,
        event_sigs: impl IntoIterator<Item = B256>,
    ) -> Self {
        Self {
            name: name.into(),
            addresses: addresses.into_iter().collect(),
            event_sigs: event_sigs.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Sets the retention period.
    pub const fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Checks that the filter can be registered.
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.name.is_empty() {
            return Err(FilterError::EmptyName);
        }
        if self.addresses.is_empty() {
            return Err(FilterError::NoAddresses);
        }
        if self.event_sigs.is_empty() {
            return Err(FilterError::NoEventSigs);
        }
        if self.addresses.iter().any(|addr| addr.is_zero()) {
            return Err(FilterError::ZeroAddress);
        }
        for (index, values) in [&self.topic2, &self.topic3, &self.topic4].into_iter().enumerate() {
            if values.len() > MAX_TOPIC_VALUES {
                return Err(FilterError::TooManyTopicValues { index: index + 1, len: values.len() });
            }
        }
        Ok(())
    }

    /// Merges `other` into `self`: sets are unioned, numeric settings take the maximum.
    pub fn merge(&mut self, other: &Self) {
        union_into(&mut self.addresses, &other.addresses);
        union_into(&mut self.event_sigs, &other.event_sigs);
        union_into(&mut self.topic2, &other.topic2);
        union_into(&mut self.topic3, &other.topic3);
        union_into(&mut self.topic4, &other.topic4);
        self.retention = self.retention.max(other.retention);
        self.max_logs_kept = self.max_logs_kept.max(other.max_logs_kept);
        self.logs_per_block = self.logs_per_block.max(other.logs_per_block);
    }

    /// Returns `true` if the log is selected by this filter.
    pub fn matches(&self, log: &Log) -> bool {
        if !self.addresses.contains(&log.address) || !self.event_sigs.contains(&log.event_sig) {
            return false;
        }
        [&self.topic2, &self.topic3, &self.topic4].into_iter().enumerate().all(|(i, allowed)| {
            allowed.is_empty() || log.topics.get(i + 1).is_some_and(|t| allowed.contains(t))
        })
    }
}

/// Appends the values of `other` missing from `target`, keeping the result sorted.
fn union_into<T: Ord + Copy>(target: &mut Vec<T>, other: &[T]) {
    let merged: BTreeSet<T> = target.iter().chain(other).copied().collect();
    *target = merged.into_iter().collect();
}

/// Errors returned when validating a [`Filter`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The filter has no name.
    #[error("filter name must not be empty")]
    EmptyName,
    /// The filter watches no address.
    #[error("at least one address must be specified")]
    NoAddresses,
    /// The filter watches no event.
    #[error("at least one event must be specified")]
    NoEventSigs,
    /// The zero address is not a valid contract address.
    #[error("invalid (zero) address")]
    ZeroAddress,
    /// A topic constraint lists too many values.
    #[error("too many values for topic {index}: {len} > {MAX_TOPIC_VALUES}")]
    TooManyTopicValues {
        /// Indexed argument position (1-based).
        index: usize,
        /// Number of values supplied.
        len: usize,
    },
}
