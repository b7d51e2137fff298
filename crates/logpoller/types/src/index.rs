use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size in bytes of an ABI data word.
pub const WORD_SIZE: usize = 32;

/// Index of an indexed event argument within a log's topics.
///
/// Topic `0` holds the event signature and cannot be queried as an indexed argument, so only
/// `1..=3` are representable.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct TopicIndex(usize);

impl TopicIndex {
    /// Creates a new [`TopicIndex`], rejecting anything outside `1..=3`.
    pub const fn new(index: usize) -> Result<Self, InvalidTopicIndex> {
        match index {
            1..=3 => Ok(Self(index)),
            _ => Err(InvalidTopicIndex(index)),
        }
    }

    /// Returns the raw index.
    pub const fn get(self) -> usize {
        self.0
    }
}

impl TryFrom<usize> for TopicIndex {
    type Error = InvalidTopicIndex;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

impl From<TopicIndex> for usize {
    fn from(index: TopicIndex) -> Self {
        index.0
    }
}

/// Error returned when a topic index outside `1..=3` is requested.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid index for topic: {0}, only indexes 1, 2 and 3 are supported")]
pub struct InvalidTopicIndex(pub usize);
