//! Recovery of logs missed by the log-triggered upkeeps.

use super::{
    BlockTimeResolver, LogDataPacker, UpkeepFilter, UpkeepFilterStore, UpkeepStateReader,
    pending::{PendingQueueActor, PendingQueueHandle},
    window::{RecoveryWindow, select_filter_batch},
};
use crate::{ChainClient, LogSource, MetricsSink, NoopMetrics, RecovererConfig, RecoveryError};
use alloy_primitives::Bytes;
use logpoller_types::{
    CoordinatedBlockProposal, Trigger, UpkeepPayload, UpkeepState, UpkeepType, WorkId,
};
use rand::Rng;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Re-scans an older window of the chain for logs the log-triggered upkeeps missed, and serves
/// them as recovery proposals.
#[derive(Debug)]
pub struct LogRecoverer {
    config: RecovererConfig,
    source: Arc<dyn LogSource>,
    client: Arc<dyn ChainClient>,
    states: Arc<dyn UpkeepStateReader>,
    packer: Arc<dyn LogDataPacker>,
    filters: Arc<dyn UpkeepFilterStore>,
    block_time_resolver: BlockTimeResolver,
    /// Average block time in milliseconds.
    block_time: AtomicU64,
    pending: PendingQueueHandle,
    metrics: Arc<dyn MetricsSink>,
}

impl LogRecoverer {
    /// Creates a new [`LogRecoverer`] and spawns the task owning its pending queue.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: RecovererConfig,
        source: Arc<dyn LogSource>,
        client: Arc<dyn ChainClient>,
        states: Arc<dyn UpkeepStateReader>,
        packer: Arc<dyn LogDataPacker>,
        filters: Arc<dyn UpkeepFilterStore>,
    ) -> Self {
        let (actor, pending) = PendingQueueActor::new(
            config.max_pending_payloads_per_upkeep,
            config.max_proposals,
            config.allowed_logs_per_upkeep,
        );
        tokio::spawn(actor.start());

        Self {
            block_time_resolver: BlockTimeResolver::new(source.clone()),
            block_time: AtomicU64::new(duration_millis(config.default_block_time)),
            config,
            source,
            client,
            states,
            packer,
            filters,
            pending,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Reports to `metrics` instead of discarding measurements.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the current block time estimate.
    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time.load(Ordering::Relaxed))
    }

    fn recovery_window(&self, latest: u64) -> Option<RecoveryWindow> {
        RecoveryWindow::new(latest, self.block_time(), &self.config)
    }

    /// Runs the recovery, cleanup and block time loops until `cancellation` fires.
    pub async fn run(&self, cancellation: CancellationToken) {
        info!(target: "log_recoverer", "Starting log recoverer");
        self.update_block_time().await;

        tokio::join!(
            self.recovery_loop(&cancellation),
            self.clean_loop(&cancellation),
            self.block_time_loop(&cancellation),
        );
        info!(target: "log_recoverer", "Log recoverer stopped");
    }

    async fn recovery_loop(&self, cancellation: &CancellationToken) {
        let period = self.config.recovery_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.recover().await {
                        warn!(target: "log_recoverer", %err, "Recovery failed");
                    }
                }
            }
        }
    }

    async fn clean_loop(&self, cancellation: &CancellationToken) {
        let period = self.config.gc_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.clean().await {
                        warn!(target: "log_recoverer", %err, "Failed to clean queued upkeeps");
                    }
                }
            }
        }
    }

    async fn block_time_loop(&self, cancellation: &CancellationToken) {
        loop {
            let delay = with_jitter(self.config.block_time_update_cadence);
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = tokio::time::sleep(delay) => self.update_block_time().await,
            }
        }
    }

    /// Runs one recovery cycle over a batch of filters.
    ///
    /// A failing filter is logged and skipped, the others are still scanned.
    pub async fn recover(&self) -> Result<(), RecoveryError> {
        let latest = self.source.latest_block().await?;
        let Some(window) = self.recovery_window(latest.block_number) else {
            debug!(target: "log_recoverer", latest = latest.block_number, "Not enough blocks to recover");
            return Ok(());
        };

        let mut filters = self.filters.filters(&|f: &UpkeepFilter| {
            f.last_repoll_block < window.end && f.config_update_block <= window.end
        });
        if filters.is_empty() {
            return Ok(());
        }
        filters.sort_by_key(|f| f.last_repoll_block);
        let filters = select_filter_batch(filters, self.config.recovery_batch_size, &mut rand::rng());

        debug!(
            target: "log_recoverer",
            filters = filters.len(),
            window_start = window.start,
            window_end = window.end,
            latest = latest.block_number,
            "Recovering logs"
        );
        for filter in &filters {
            if let Err(err) = self.recover_filter(filter, window).await {
                debug!(target: "log_recoverer", upkeep_id = %filter.upkeep_id, %err, "Error recovering filter");
            }
        }
        Ok(())
    }

    /// Queues the unresolved logs of `filter` in its next block range, and advances its cursor
    /// once every one of them is queued.
    async fn recover_filter(
        &self,
        filter: &UpkeepFilter,
        window: RecoveryWindow,
    ) -> Result<(), RecoveryError> {
        let (start, end) = window.block_range(filter, &self.config);
        let logs = filter.select(
            self.source.logs_with_sigs(start, end, &[filter.event_sig], filter.address).await?,
        );

        let work_ids: Vec<WorkId> = logs
            .iter()
            .map(|log| WorkId::new(&filter.upkeep_id, &Trigger::unanchored(log)))
            .collect();
        let states = self.states.select_by_work_ids(&work_ids).await?;
        if states.len() != logs.len() {
            return Err(RecoveryError::StateCountMismatch { logs: logs.len(), states: states.len() });
        }

        let payloads: Vec<UpkeepPayload> = logs
            .iter()
            .zip(states)
            .filter(|(_, state)| *state == UpkeepState::Unknown)
            .filter_map(|(log, _)| match self.packer.pack_log_data(log) {
                Ok(check_data) => {
                    Some(UpkeepPayload::new(filter.upkeep_id, Trigger::unanchored(log), check_data))
                }
                Err(err) => {
                    warn!(target: "log_recoverer", %err, tx_hash = %log.tx_hash, "Failed to pack log data");
                    None
                }
            })
            .collect();

        let outcome = self.pending.populate(payloads).await?;
        self.metrics.set_pending_payloads(outcome.pending);
        if outcome.added > 0 {
            debug!(
                target: "log_recoverer",
                added = outcome.added,
                already_pending = outcome.already_pending,
                upkeep_id = %filter.upkeep_id,
                "Found missed logs"
            );
            self.metrics.record_missed_logs(outcome.added);
        }
        if outcome.rejected > 0 {
            debug!(target: "log_recoverer", upkeep_id = %filter.upkeep_id, "Failed to add all logs to pending");
            return Ok(());
        }

        self.filters.update_last_repoll_block(&filter.upkeep_id, end);
        debug!(target: "log_recoverer", upkeep_id = %filter.upkeep_id, last_repoll_block = end, "Updated lastRePollBlock");
        Ok(())
    }

    /// Drains the next recovery proposals.
    pub async fn get_recovery_proposals(&self) -> Result<Vec<UpkeepPayload>, RecoveryError> {
        let latest = self.source.latest_block().await?;
        let (proposals, pending) = self.pending.take_proposals(latest.block_number).await?;
        self.metrics.set_pending_payloads(pending);
        debug!(target: "log_recoverer", proposals = proposals.len(), pending, "Found recoverable payloads");
        Ok(proposals)
    }

    /// Verifies that the log behind `proposal` is still canonical, recoverable and unresolved,
    /// and returns its packed check data.
    pub async fn get_proposal_data(
        &self,
        proposal: &CoordinatedBlockProposal,
    ) -> Result<Bytes, RecoveryError> {
        let upkeep_id = proposal.upkeep_id;
        if upkeep_id.upkeep_type() != UpkeepType::LogTrigger {
            return Err(RecoveryError::NotLogTrigger(upkeep_id));
        }
        let filter = self.filters.filter(&upkeep_id).ok_or(RecoveryError::FilterNotFound(upkeep_id))?;

        let latest = self.source.latest_block().await?;
        let window = self.recovery_window(latest.block_number);
        let ext = proposal.trigger.log_trigger_extension.ok_or(RecoveryError::MissingLogTriggerExtension)?;

        // the log block of the proposal is not part of the work id, ask the chain instead
        let tx_block =
            self.client.tx_block(ext.tx_hash).await?.ok_or(RecoveryError::TxNotFound(ext.tx_hash))?;
        if tx_block.hash != ext.block_hash {
            return Err(RecoveryError::TxReorged);
        }
        let log_block = tx_block.number;
        if !window.is_some_and(|w| w.contains_strict(log_block)) {
            return Err(RecoveryError::NotRecoverable(log_block));
        }

        let states = self.states.select_by_work_ids(&[proposal.work_id]).await?;
        if let Some(state) = states.into_iter().find(UpkeepState::is_terminal) {
            return Err(RecoveryError::TerminalState(state));
        }

        if filter.config_update_block > log_block {
            return Err(RecoveryError::BeforeConfigUpdate {
                block: log_block,
                config_update_block: filter.config_update_block,
                upkeep_id,
            });
        }

        let logs = filter.select(
            self.source
                .logs_with_sigs(
                    log_block.saturating_sub(1),
                    log_block + 1,
                    &[filter.event_sig],
                    filter.address,
                )
                .await?,
        );
        for log in &logs {
            let trigger = Trigger {
                block_number: proposal.trigger.block_number,
                block_hash: proposal.trigger.block_hash,
                ..Trigger::from_log(log)
            };
            if WorkId::new(&upkeep_id, &trigger) == proposal.work_id {
                debug!(target: "log_recoverer", %upkeep_id, tx_hash = %log.tx_hash, "Found log for proposal");
                return Ok(self.packer.pack_log_data(log)?);
            }
        }
        Err(RecoveryError::LogNotFound { upkeep_id, work_id: proposal.work_id })
    }

    /// Expires queued payloads older than the cache TTL, returning how many were dropped.
    pub async fn clean(&self) -> Result<usize, RecoveryError> {
        let expired = self.pending.expired(self.config.cache_ttl).await?;
        if expired.is_empty() {
            debug!(target: "log_recoverer", "No expired upkeeps");
            return Ok(0);
        }
        self.try_expire(expired).await
    }

    async fn try_expire(&self, ids: Vec<WorkId>) -> Result<usize, RecoveryError> {
        let latest = self.source.latest_block().await?;
        let states = self.states.select_by_work_ids(&ids).await?;
        if states.len() != ids.len() {
            return Err(RecoveryError::StateCountMismatch { logs: ids.len(), states: states.len() });
        }
        let window_start = self.recovery_window(latest.block_number).map_or(0, |w| w.start);

        let expired = ids.len();
        let outcome = self.pending.expire(ids, states, window_start).await?;
        self.metrics.set_pending_payloads(outcome.pending);
        if outcome.removed > 0 {
            debug!(
                target: "log_recoverer",
                expired,
                cleaned = outcome.removed,
                requeued = outcome.requeued,
                "Expired upkeeps"
            );
        }
        Ok(outcome.removed)
    }

    /// Refreshes the block time estimate from the stored blocks.
    pub async fn update_block_time(&self) {
        let estimate = match self.block_time_resolver.block_time(self.config.block_time_sample_size).await {
            Ok(estimate) => estimate,
            Err(err) => {
                warn!(target: "log_recoverer", %err, "Failed to compute block time");
                return;
            }
        };
        let new = duration_millis(estimate);
        if new == 0 {
            return;
        }

        let current = self.block_time.load(Ordering::Relaxed);
        if current > 0 && current.abs_diff(new) * 100 / current > 20 {
            warn!(target: "log_recoverer", current, new, "Updating block time by more than 20%");
        } else {
            debug!(target: "log_recoverer", current, new, "Updating block time");
        }
        self.block_time.store(new, Ordering::Relaxed);
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Scales `period` by a random factor in `0.9..=1.1`.
fn with_jitter(period: Duration) -> Duration {
    period.mul_f64(rand::rng().random_range(0.9..=1.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AbiLogDataPacker, ChainHead, ClientError, InMemoryUpkeepFilterStore,
        test_utils::{MemoryLogSource, RecordingMetrics},
    };
    use alloy_eips::BlockNumHash;
    use alloy_primitives::{Address, B256, U256, address, b256};
    use async_trait::async_trait;
    use logpoller_types::{Log, UpkeepId};
    use mockall::mock;
    use std::{
        collections::{HashMap, HashSet},
        sync::Mutex,
    };

    const EMITTER: Address = address!("0x00000000000000000000000000000000000000aa");
    const SIG: B256 = b256!("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

    mock! {
        #[derive(Debug)]
        pub StateReader {}

        #[async_trait]
        impl UpkeepStateReader for StateReader {
            async fn select_by_work_ids(&self, work_ids: &[WorkId]) -> Result<Vec<UpkeepState>, RecoveryError>;
        }
    }

    mock! {
        #[derive(Debug)]
        pub Client {}

        #[async_trait]
        impl ChainClient for Client {
            async fn chain_head(&self) -> Result<ChainHead, ClientError>;
            async fn header_by_number(&self, number: u64) -> Result<Option<crate::BlockHeader>, ClientError>;
            async fn logs_in_range(
                &self,
                from_block: u64,
                to_block: u64,
                addresses: &[Address],
                event_sigs: &[B256],
            ) -> Result<Vec<Log>, ClientError>;
            async fn logs_by_block_hash(
                &self,
                block_hash: B256,
                addresses: &[Address],
                event_sigs: &[B256],
            ) -> Result<Vec<Log>, ClientError>;
            async fn tx_block(&self, tx_hash: B256) -> Result<Option<BlockNumHash>, ClientError>;
        }
    }

    fn log_upkeep(n: u8) -> UpkeepId {
        let mut id = B256::ZERO;
        id[15] = 1;
        id[31] = n;
        UpkeepId(id)
    }

    fn proposal_for(upkeep_id: UpkeepId, log: &Log) -> CoordinatedBlockProposal {
        let payload = UpkeepPayload::new(upkeep_id, Trigger::unanchored(log), Bytes::new());
        let mut proposal = CoordinatedBlockProposal::from(&payload);
        // the coordinator assigns the check block
        proposal.trigger.block_number = 990;
        proposal.trigger.block_hash = MemoryLogSource::block_hash(990);
        proposal
    }

    /// A recoverer over 1000 stored blocks one second apart: the window is `(0, 850)`.
    struct Harness {
        source: Arc<MemoryLogSource>,
        filters: Arc<InMemoryUpkeepFilterStore>,
        performed: Arc<Mutex<HashSet<WorkId>>>,
        txs: Arc<Mutex<HashMap<B256, BlockNumHash>>>,
        metrics: Arc<RecordingMetrics>,
        recoverer: LogRecoverer,
    }

    impl Harness {
        fn new(latest: u64) -> Self {
            let performed = Arc::new(Mutex::new(HashSet::new()));
            let resolved = performed.clone();
            let mut states = MockStateReader::new();
            states.expect_select_by_work_ids().returning(move |ids: &[WorkId]| {
                let resolved = resolved.lock().unwrap();
                Ok(ids
                    .iter()
                    .map(|id| {
                        if resolved.contains(id) { UpkeepState::Performed } else { UpkeepState::Unknown }
                    })
                    .collect())
            });
            Self::with_states(latest, states, performed)
        }

        fn with_states(
            latest: u64,
            states: MockStateReader,
            performed: Arc<Mutex<HashSet<WorkId>>>,
        ) -> Self {
            let source = Arc::new(MemoryLogSource::with_blocks(latest, 1));
            let filters = Arc::new(InMemoryUpkeepFilterStore::default());
            let metrics = Arc::new(RecordingMetrics::default());

            let txs = Arc::new(Mutex::new(HashMap::<B256, BlockNumHash>::new()));
            let mined = txs.clone();
            let mut client = MockClient::new();
            client
                .expect_tx_block()
                .returning(move |tx_hash| Ok(mined.lock().unwrap().get(&tx_hash).copied()));

            let recoverer = LogRecoverer::new(
                RecovererConfig::default(),
                source.clone(),
                Arc::new(client),
                Arc::new(states),
                Arc::new(AbiLogDataPacker),
                filters.clone(),
            )
            .with_metrics(metrics.clone());

            Self { source, filters, performed, txs, metrics, recoverer }
        }

        fn register(&self, upkeep_id: UpkeepId, config_update_block: u64) {
            self.filters.upsert(vec![UpkeepFilter {
                upkeep_id,
                address: EMITTER,
                event_sig: SIG,
                config_update_block,
                ..Default::default()
            }]);
        }

        fn add_log(&self, number: u64) -> Log {
            let log = self.source.add_log(number, EMITTER, vec![SIG]);
            self.txs
                .lock()
                .unwrap()
                .insert(log.tx_hash, BlockNumHash { number, hash: log.block_hash });
            log
        }

        fn cursor(&self, upkeep_id: &UpkeepId) -> u64 {
            self.filters.filter(upkeep_id).unwrap().last_repoll_block
        }
    }

    #[tokio::test]
    async fn test_recover_queues_missed_logs() {
        let h = Harness::new(1000);
        h.register(log_upkeep(1), 0);
        let first = h.add_log(100);
        let second = h.add_log(200);
        // past the first block range
        h.add_log(300);

        h.recoverer.recover().await.unwrap();
        assert_eq!(h.cursor(&log_upkeep(1)), 201);
        assert_eq!(h.metrics.missed_logs.load(Ordering::SeqCst), 2);

        let proposals = h.recoverer.get_recovery_proposals().await.unwrap();
        let mut blocks: Vec<_> = proposals
            .iter()
            .map(|p| p.trigger.log_trigger_extension.unwrap().block_number)
            .collect();
        blocks.sort_unstable();
        assert_eq!(blocks, vec![first.block_number, second.block_number]);
        assert!(proposals.iter().all(|p| p.trigger.block_number == 0));
        assert!(h.recoverer.get_recovery_proposals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recover_skips_resolved_work() {
        let h = Harness::new(1000);
        h.register(log_upkeep(1), 0);
        let performed = h.add_log(100);
        h.add_log(150);
        h.performed
            .lock()
            .unwrap()
            .insert(WorkId::new(&log_upkeep(1), &Trigger::unanchored(&performed)));

        h.recoverer.recover().await.unwrap();

        let proposals = h.recoverer.get_recovery_proposals().await.unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].trigger.log_trigger_extension.unwrap().block_number, 150);
    }

    #[tokio::test]
    async fn test_recover_starts_at_config_update() {
        let h = Harness::new(1000);
        h.register(log_upkeep(1), 400);
        h.add_log(100);
        h.add_log(450);

        h.recoverer.recover().await.unwrap();

        assert_eq!(h.cursor(&log_upkeep(1)), 600);
        let proposals = h.recoverer.get_recovery_proposals().await.unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].trigger.log_trigger_extension.unwrap().block_number, 450);
    }

    #[tokio::test]
    async fn test_state_count_mismatch_keeps_cursor() {
        let mut states = MockStateReader::new();
        states.expect_select_by_work_ids().returning(|_| Ok(vec![]));
        let h = Harness::with_states(1000, states, Arc::default());
        h.register(log_upkeep(1), 0);
        h.add_log(100);

        h.recoverer.recover().await.unwrap();

        assert_eq!(h.cursor(&log_upkeep(1)), 0);
        assert!(h.recoverer.get_recovery_proposals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_short_chain_has_no_window() {
        let mut states = MockStateReader::new();
        states.expect_select_by_work_ids().never();
        let h = Harness::with_states(100, states, Arc::default());
        h.register(log_upkeep(1), 0);
        h.add_log(50);

        h.recoverer.recover().await.unwrap();
        assert_eq!(h.cursor(&log_upkeep(1)), 0);
    }

    #[tokio::test]
    async fn test_caught_up_filters_are_not_scanned() {
        let h = Harness::new(1000);
        h.register(log_upkeep(1), 0);
        h.filters.update_last_repoll_block(&log_upkeep(1), 850);
        h.add_log(840);

        h.recoverer.recover().await.unwrap();

        assert_eq!(h.cursor(&log_upkeep(1)), 850);
        assert!(h.recoverer.get_recovery_proposals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_proposal_data_of_recoverable_log() {
        let h = Harness::new(1000);
        h.register(log_upkeep(1), 0);
        let log = h.add_log(100);

        let data = h.recoverer.get_proposal_data(&proposal_for(log_upkeep(1), &log)).await.unwrap();
        assert_eq!(data, AbiLogDataPacker.pack_log_data(&log).unwrap());
    }

    #[tokio::test]
    async fn test_proposal_data_rejections() {
        let h = Harness::new(1000);
        h.register(log_upkeep(1), 0);
        h.register(log_upkeep(2), 300);
        let log = h.add_log(100);

        let conditional = UpkeepId::from_u256(U256::from(7));
        let err = h.recoverer.get_proposal_data(&proposal_for(conditional, &log)).await.unwrap_err();
        assert!(matches!(err, RecoveryError::NotLogTrigger(id) if id == conditional));

        let err =
            h.recoverer.get_proposal_data(&proposal_for(log_upkeep(9), &log)).await.unwrap_err();
        assert!(matches!(err, RecoveryError::FilterNotFound(_)));

        let mut proposal = proposal_for(log_upkeep(1), &log);
        proposal.trigger.log_trigger_extension = None;
        let err = h.recoverer.get_proposal_data(&proposal).await.unwrap_err();
        assert!(matches!(err, RecoveryError::MissingLogTriggerExtension));

        let err =
            h.recoverer.get_proposal_data(&proposal_for(log_upkeep(2), &log)).await.unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::BeforeConfigUpdate { block: 100, config_update_block: 300, .. }
        ));

        h.performed
            .lock()
            .unwrap()
            .insert(WorkId::new(&log_upkeep(1), &Trigger::unanchored(&log)));
        let err =
            h.recoverer.get_proposal_data(&proposal_for(log_upkeep(1), &log)).await.unwrap_err();
        assert!(matches!(err, RecoveryError::TerminalState(UpkeepState::Performed)));
    }

    #[tokio::test]
    async fn test_proposal_data_of_moved_tx() {
        let h = Harness::new(1000);
        h.register(log_upkeep(1), 0);
        let log = h.add_log(100);
        let proposal = proposal_for(log_upkeep(1), &log);

        h.txs
            .lock()
            .unwrap()
            .insert(log.tx_hash, BlockNumHash { number: 101, hash: B256::repeat_byte(0x01) });
        let err = h.recoverer.get_proposal_data(&proposal).await.unwrap_err();
        assert!(matches!(err, RecoveryError::TxReorged));

        h.txs.lock().unwrap().clear();
        let err = h.recoverer.get_proposal_data(&proposal).await.unwrap_err();
        assert!(matches!(err, RecoveryError::TxNotFound(hash) if hash == log.tx_hash));
    }

    #[tokio::test]
    async fn test_proposal_data_outside_window() {
        let h = Harness::new(1000);
        h.register(log_upkeep(1), 0);
        let recent = h.add_log(900);
        // the window is open at the end
        let edge = h.add_log(850);

        for log in [recent, edge] {
            let err = h
                .recoverer
                .get_proposal_data(&proposal_for(log_upkeep(1), &log))
                .await
                .unwrap_err();
            assert!(matches!(err, RecoveryError::NotRecoverable(b) if b == log.block_number));
        }
    }

    #[tokio::test]
    async fn test_proposal_data_without_stored_log() {
        let h = Harness::new(1000);
        h.register(log_upkeep(1), 0);
        let log = h.add_log(100);
        let forged = Log { log_index: 5, ..log.clone() };
        h.txs
            .lock()
            .unwrap()
            .insert(forged.tx_hash, BlockNumHash { number: 100, hash: log.block_hash });

        let err =
            h.recoverer.get_proposal_data(&proposal_for(log_upkeep(1), &forged)).await.unwrap_err();
        assert!(matches!(err, RecoveryError::LogNotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_drops_resolved_payloads() {
        let h = Harness::new(1000);
        h.register(log_upkeep(1), 0);
        let performed = h.add_log(100);
        let unresolved = h.add_log(200);

        h.recoverer.recover().await.unwrap();
        assert_eq!(h.recoverer.clean().await.unwrap(), 0);

        h.performed
            .lock()
            .unwrap()
            .insert(WorkId::new(&log_upkeep(1), &Trigger::unanchored(&performed)));
        tokio::time::advance(RecovererConfig::default().cache_ttl + Duration::from_secs(1)).await;
        assert_eq!(h.recoverer.clean().await.unwrap(), 1);

        let proposals = h.recoverer.get_recovery_proposals().await.unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].trigger.log_trigger_extension.unwrap().tx_hash, unresolved.tx_hash);
    }

    #[tokio::test]
    async fn test_update_block_time() {
        let h = Harness::new(1000);
        assert_eq!(h.recoverer.block_time(), Duration::from_secs(1));

        let slow = LogRecoverer::new(
            RecovererConfig::default(),
            Arc::new(MemoryLogSource::with_blocks(1000, 2)),
            Arc::new(MockClient::new()),
            Arc::new(MockStateReader::new()),
            Arc::new(AbiLogDataPacker),
            h.filters.clone(),
        );
        slow.update_block_time().await;
        assert_eq!(slow.block_time(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_update_block_time_keeps_estimate_without_blocks() {
        let recoverer = LogRecoverer::new(
            RecovererConfig { default_block_time: Duration::from_millis(250), ..Default::default() },
            Arc::new(MemoryLogSource::default()),
            Arc::new(MockClient::new()),
            Arc::new(MockStateReader::new()),
            Arc::new(AbiLogDataPacker),
            Arc::new(InMemoryUpkeepFilterStore::default()),
        );
        recoverer.update_block_time().await;
        assert_eq!(recoverer.block_time(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_recovers_until_cancelled() {
        let h = Harness::new(1000);
        h.register(log_upkeep(1), 0);
        h.add_log(100);

        let cancellation = CancellationToken::new();
        let cancel = async {
            tokio::time::sleep(Duration::from_secs(6)).await;
            cancellation.cancel();
        };
        tokio::join!(h.recoverer.run(cancellation.clone()), cancel);

        assert_eq!(h.cursor(&log_upkeep(1)), 201);
        assert_eq!(h.recoverer.get_recovery_proposals().await.unwrap().len(), 1);
    }

    #[test]
    fn test_jitter_bounds() {
        let period = Duration::from_secs(100);
        for _ in 0..100 {
            let delay = with_jitter(period);
            assert!(delay >= Duration::from_secs(90) && delay <= Duration::from_secs(110));
        }
    }
}
