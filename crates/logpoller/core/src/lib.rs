#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod client;
pub use client::{AlloyChainClient, BlockHeader, ChainClient, ChainHead, ClientError};

mod config;
pub use config::{ClientConfig, DEFAULT_RPC_TIMEOUT, PollerConfig, RecovererConfig};

mod metrics;
pub use metrics::{MetricsSink, NoopMetrics, PrometheusMetrics};

mod poller;
pub use poller::{LogPoller, LogPollerError, LogSource, SyncState};

mod recoverer;
pub use recoverer::{
    AbiLogDataPacker, BlockTimeResolver, InMemoryUpkeepFilterStore, LogDataPacker, LogRecoverer,
    PackerError, RecoveryError, UpkeepFilter, UpkeepFilterStore, UpkeepStateReader,
};

#[cfg(test)]
pub(crate) mod test_utils;
