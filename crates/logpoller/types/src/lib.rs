#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod log;
pub use log::Log;

mod block;
pub use block::LogPollerBlock;

mod confirmations;
pub use confirmations::Confirmations;

mod filter;
pub use filter::{Filter, FilterError, MAX_TOPIC_VALUES};

mod index;
pub use index::{InvalidTopicIndex, TopicIndex, WORD_SIZE};

mod upkeep;
pub use upkeep::{
    CoordinatedBlockProposal, LogTriggerExtension, Trigger, UpkeepId, UpkeepPayload, UpkeepState,
    UpkeepType, WorkId,
};
