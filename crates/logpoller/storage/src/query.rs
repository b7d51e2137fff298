//! Declarative log selection used by every range query of the store.

use alloy_primitives::{Address, B256};
use logpoller_types::{Confirmations, Log, TopicIndex};

/// A selection over the logs table.
///
/// Empty address or signature sets match any value. When both are non-empty the query is served
/// from the `(address, event_sig)` index.
#[derive(Debug, Clone)]
pub(crate) struct LogQuery {
    pub(crate) addresses: Vec<Address>,
    pub(crate) event_sigs: Vec<B256>,
    /// Inclusive lower bound.
    pub(crate) from_block: u64,
    /// Inclusive upper bound, further capped by `confirmations`.
    pub(crate) to_block: u64,
    pub(crate) confirmations: Option<Confirmations>,
    pub(crate) predicates: Vec<LogPredicate>,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            event_sigs: Vec::new(),
            from_block: 0,
            to_block: u64::MAX,
            confirmations: None,
            predicates: Vec::new(),
        }
    }
}

impl LogQuery {
    pub(crate) fn event(address: Address, event_sig: B256) -> Self {
        Self { addresses: vec![address], event_sigs: vec![event_sig], ..Default::default() }
    }

    pub(crate) const fn blocks(mut self, from_block: u64, to_block: u64) -> Self {
        self.from_block = from_block;
        self.to_block = to_block;
        self
    }

    pub(crate) const fn confirmations(mut self, confs: Confirmations) -> Self {
        self.confirmations = Some(confs);
        self
    }

    pub(crate) fn filter(mut self, predicate: LogPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub(crate) fn matches(&self, log: &Log) -> bool {
        (self.addresses.is_empty() || self.addresses.contains(&log.address)) &&
            (self.event_sigs.is_empty() || self.event_sigs.contains(&log.event_sig)) &&
            self.predicates.iter().all(|p| p.matches(log))
    }
}

/// Extra conditions applied to candidate logs.
#[derive(Debug, Clone)]
pub(crate) enum LogPredicate {
    /// `topics[index]` is one of `values`.
    TopicIn { index: TopicIndex, values: Vec<B256> },
    /// `min <= topics[index] <= max`.
    TopicRange { index: TopicIndex, min: B256, max: B256 },
    /// `min <= word[index] <= max`.
    WordRange { index: usize, min: B256, max: B256 },
    /// `word[lower] <= value <= word[upper]`.
    WordsAround { lower: usize, upper: usize, value: B256 },
    /// The block timestamp is strictly after the given unix time.
    CreatedAfter(u64),
    /// Emitted by the given transaction.
    TxHash(B256),
}

impl LogPredicate {
    fn matches(&self, log: &Log) -> bool {
        match self {
            Self::TopicIn { index, values } => log.topic(*index).is_some_and(|t| values.contains(&t)),
            Self::TopicRange { index, min, max } => {
                log.topic(*index).is_some_and(|t| *min <= t && t <= *max)
            }
            Self::WordRange { index, min, max } => {
                log.data_word(*index).is_some_and(|w| *min <= w && w <= *max)
            }
            Self::WordsAround { lower, upper, value } => {
                log.data_word(*lower).is_some_and(|w| w <= *value) &&
                    log.data_word(*upper).is_some_and(|w| w >= *value)
            }
            Self::CreatedAfter(after) => log.block_timestamp > *after,
            Self::TxHash(hash) => log.tx_hash == *hash,
        }
    }
}
