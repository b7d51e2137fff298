//! Observability sink injected into the poller and the recoverer.

use alloy_primitives::ChainId;
use std::fmt::Debug;

/// Receives the measurements of the poller and the recoverer.
///
/// Every method defaults to a no-op so sinks only implement what they export.
pub trait MetricsSink: Debug + Send + Sync {
    /// A poll tick stored `count` new blocks.
    fn record_blocks_processed(&self, _count: u64) {}

    /// A poll tick stored `count` logs.
    fn record_logs_inserted(&self, _count: u64) {}

    /// A reorg of `depth` blocks was unwound.
    fn record_reorg(&self, _depth: u64) {}

    /// A poll tick failed.
    fn record_poll_error(&self) {}

    /// The latest stored block moved to `number`.
    fn set_latest_block(&self, _number: u64) {}

    /// The recoverer holds `count` pending payloads.
    fn set_pending_payloads(&self, _count: usize) {}

    /// The recoverer queued `count` logs missed by the regular provider.
    fn record_missed_logs(&self, _count: usize) {}
}

/// A [`MetricsSink`] that drops every measurement.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// A [`MetricsSink`] writing to the global `metrics` recorder, labelled by chain.
#[derive(Debug, Clone)]
pub struct PrometheusMetrics {
    chain_id: String,
}

impl PrometheusMetrics {
    pub(crate) const LOGPOLLER_BLOCKS_PROCESSED_TOTAL: &'static str =
        "logpoller_blocks_processed_total";
    pub(crate) const LOGPOLLER_LOGS_INSERTED_TOTAL: &'static str = "logpoller_logs_inserted_total";
    pub(crate) const LOGPOLLER_REORG_DEPTH: &'static str = "logpoller_reorg_depth";
    pub(crate) const LOGPOLLER_POLL_ERROR_TOTAL: &'static str = "logpoller_poll_error_total";
    pub(crate) const LOGPOLLER_LATEST_BLOCK: &'static str = "logpoller_latest_block";
    pub(crate) const LOGPOLLER_RECOVERER_PENDING_PAYLOADS: &'static str =
        "logpoller_recoverer_pending_payloads";
    pub(crate) const LOGPOLLER_RECOVERER_MISSED_LOGS_TOTAL: &'static str =
        "logpoller_recoverer_missed_logs_total";

    /// Creates the sink for `chain_id`, describing and zeroing its series.
    pub fn new(chain_id: ChainId) -> Self {
        let metrics = Self { chain_id: chain_id.to_string() };
        metrics.init();
        metrics
    }

    fn init(&self) {
        Self::describe();
        self.zero();
    }

    fn describe() {
        metrics::describe_counter!(
            Self::LOGPOLLER_BLOCKS_PROCESSED_TOTAL,
            metrics::Unit::Count,
            "Total number of blocks stored by the log poller",
        );

        metrics::describe_counter!(
            Self::LOGPOLLER_LOGS_INSERTED_TOTAL,
            metrics::Unit::Count,
            "Total number of logs stored by the log poller",
        );

        metrics::describe_histogram!(
            Self::LOGPOLLER_REORG_DEPTH,
            metrics::Unit::Count,
            "Depth of the reorgs unwound by the log poller",
        );

        metrics::describe_counter!(
            Self::LOGPOLLER_POLL_ERROR_TOTAL,
            metrics::Unit::Count,
            "Total number of failed poll ticks",
        );

        metrics::describe_gauge!(
            Self::LOGPOLLER_LATEST_BLOCK,
            metrics::Unit::Count,
            "Latest block stored by the log poller",
        );

        metrics::describe_gauge!(
            Self::LOGPOLLER_RECOVERER_PENDING_PAYLOADS,
            metrics::Unit::Count,
            "Number of payloads waiting in the recoverer pending queue",
        );

        metrics::describe_counter!(
            Self::LOGPOLLER_RECOVERER_MISSED_LOGS_TOTAL,
            metrics::Unit::Count,
            "Total number of missed logs queued by the recoverer",
        );
    }

    fn zero(&self) {
        let chain_id = self.chain_id.clone();
        metrics::counter!(Self::LOGPOLLER_BLOCKS_PROCESSED_TOTAL, "chain_id" => chain_id.clone())
            .increment(0);
        metrics::counter!(Self::LOGPOLLER_LOGS_INSERTED_TOTAL, "chain_id" => chain_id.clone())
            .increment(0);
        metrics::histogram!(Self::LOGPOLLER_REORG_DEPTH, "chain_id" => chain_id.clone()).record(0);
        metrics::counter!(Self::LOGPOLLER_POLL_ERROR_TOTAL, "chain_id" => chain_id.clone())
            .increment(0);
        metrics::gauge!(Self::LOGPOLLER_LATEST_BLOCK, "chain_id" => chain_id.clone()).set(0);
        metrics::gauge!(Self::LOGPOLLER_RECOVERER_PENDING_PAYLOADS, "chain_id" => chain_id.clone())
            .set(0);
        metrics::counter!(Self::LOGPOLLER_RECOVERER_MISSED_LOGS_TOTAL, "chain_id" => chain_id)
            .increment(0);
    }
}

impl MetricsSink for PrometheusMetrics {
    fn record_blocks_processed(&self, count: u64) {
        metrics::counter!(Self::LOGPOLLER_BLOCKS_PROCESSED_TOTAL, "chain_id" => self.chain_id.clone())
            .increment(count);
    }

    fn record_logs_inserted(&self, count: u64) {
        metrics::counter!(Self::LOGPOLLER_LOGS_INSERTED_TOTAL, "chain_id" => self.chain_id.clone())
            .increment(count);
    }

    fn record_reorg(&self, depth: u64) {
        metrics::histogram!(Self::LOGPOLLER_REORG_DEPTH, "chain_id" => self.chain_id.clone())
            .record(depth as f64);
    }

    fn record_poll_error(&self) {
        metrics::counter!(Self::LOGPOLLER_POLL_ERROR_TOTAL, "chain_id" => self.chain_id.clone())
            .increment(1);
    }

    fn set_latest_block(&self, number: u64) {
        metrics::gauge!(Self::LOGPOLLER_LATEST_BLOCK, "chain_id" => self.chain_id.clone())
            .set(number as f64);
    }

    fn set_pending_payloads(&self, count: usize) {
        metrics::gauge!(
            Self::LOGPOLLER_RECOVERER_PENDING_PAYLOADS,
            "chain_id" => self.chain_id.clone(),
        )
        .set(count as f64);
    }

    fn record_missed_logs(&self, count: usize) {
        metrics::counter!(
            Self::LOGPOLLER_RECOVERER_MISSED_LOGS_TOTAL,
            "chain_id" => self.chain_id.clone(),
        )
        .increment(count as u64);
    }
}
