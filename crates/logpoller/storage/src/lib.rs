#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod error;
pub use error::StorageError;

mod batch;
pub use batch::{BatchConfig, DEFAULT_BATCH_SIZE, MIN_BATCH_SIZE, insert_in_batches};

pub mod models;
mod providers;
mod query;

mod traits;
pub use traits::{
    BlockStorageReader, FilterStorage, LogStorageReader, LogStorageWriter, LogStore,
    RetentionStorage,
};

mod chaindb;
pub use chaindb::ChainDb;
