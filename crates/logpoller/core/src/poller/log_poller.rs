use super::reorg::find_common_ancestor;
use crate::{
    BlockHeader, ChainClient, ChainHead, LogPollerError, LogSource, MetricsSink, PollerConfig,
    SyncState,
};
use alloy_eips::BlockNumHash;
use alloy_primitives::{Address, B256, ChainId};
use async_trait::async_trait;
use logpoller_storage::LogStore;
use logpoller_types::{Filter, Log, LogPollerBlock};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, hash_map::Entry},
    sync::Arc,
};
use tokio::{
    sync::{Mutex, RwLock, watch},
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Follows the head of a chain and ingests the logs selected by the registered filters.
///
/// The poller keeps the store a prefix of the canonical chain: every stored block is unwound as
/// soon as the remote chain no longer contains it. Polling and replay are serialized so a replay
/// never interleaves with a reorg rollback.
#[derive(Debug)]
pub struct LogPoller<C, DB> {
    chain_id: ChainId,
    client: Arc<C>,
    db: Arc<DB>,
    config: PollerConfig,
    filters: RwLock<BTreeMap<String, Filter>>,
    state: watch::Sender<SyncState>,
    poll_lock: Mutex<()>,
    metrics: Arc<dyn MetricsSink>,
}

impl<C, DB> LogPoller<C, DB>
where
    C: ChainClient,
    DB: LogStore,
{
    /// Creates a new [`LogPoller`]. Filters are loaded from the store by [`Self::load_filters`].
    pub fn new(
        chain_id: ChainId,
        client: Arc<C>,
        db: Arc<DB>,
        config: PollerConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::default());
        Self {
            chain_id,
            client,
            db,
            config,
            filters: RwLock::default(),
            state,
            poll_lock: Mutex::new(()),
            metrics,
        }
    }

    /// Returns the store, which serves every log query.
    pub fn store(&self) -> &Arc<DB> {
        &self.db
    }

    /// Returns the current synchronization state.
    pub fn sync_state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Subscribes to synchronization state changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Refreshes the in-memory filters from the store, returning how many are registered.
    pub async fn load_filters(&self) -> Result<usize, LogPollerError> {
        let stored = self.db.load_filters()?;
        let count = stored.len();
        *self.filters.write().await = stored;
        Ok(count)
    }

    /// Validates and persists `filter`, merging it with a registered filter of the same name.
    ///
    /// Blocks already ingested are not re-fetched; use [`Self::replay`] for that.
    pub async fn register_filter(&self, filter: Filter) -> Result<(), LogPollerError> {
        filter.validate()?;
        let merged = self.db.insert_filter(&filter)?;
        info!(
            target: "log_poller",
            chain_id = self.chain_id,
            name = %merged.name,
            addresses = merged.addresses.len(),
            event_sigs = merged.event_sigs.len(),
            "Registered filter"
        );
        self.load_filters().await?;
        Ok(())
    }

    /// Removes the filter named `name`. Already ingested logs are left to retention.
    pub async fn unregister_filter(&self, name: &str) -> Result<(), LogPollerError> {
        self.db.delete_filter(name)?;
        info!(target: "log_poller", chain_id = self.chain_id, name, "Unregistered filter");
        self.load_filters().await?;
        Ok(())
    }

    /// Returns `true` if a filter named `name` is registered.
    pub async fn has_filter(&self, name: &str) -> bool {
        self.filters.read().await.contains_key(name)
    }

    /// Runs one poll tick: unwinds reorged blocks, backfills finalized ranges and ingests the
    /// unfinalized tail block by block.
    pub async fn poll_and_save_logs(&self) -> Result<(), LogPollerError> {
        let _guard = self.poll_lock.lock().await;
        let filters = self.filters.read().await.clone();
        if filters.is_empty() {
            debug!(target: "log_poller", chain_id = self.chain_id, "No filters registered");
            return Ok(());
        }

        let head = self.client.chain_head().await?;
        let mut next = match self.db.latest_block()? {
            Some(last) => self.check_reorg(&last, &head).await?,
            None => self.config.start_block.unwrap_or(head.finalized_number),
        };

        if next > head.latest.number {
            if next == head.latest.number + 1 {
                self.publish(SyncState::Synced);
            } else {
                debug!(
                    target: "log_poller",
                    chain_id = self.chain_id,
                    remote = head.latest.number,
                    stored = next - 1,
                    "Remote head is behind the stored tip"
                );
                self.publish(SyncState::Behind);
            }
            return Ok(());
        }
        if self.sync_state() != SyncState::RecoveringFromReorg {
            self.publish(SyncState::Behind);
        }

        let (addresses, event_sigs) = watched(&filters);
        next = self.backfill(next, &head, &filters, &addresses, &event_sigs).await?;
        self.ingest_tail(next, &head, &filters, &addresses, &event_sigs).await?;

        self.publish(SyncState::Synced);
        Ok(())
    }

    /// Re-fetches the logs of `from_block..=latest` for the current filters.
    ///
    /// Only logs agreeing with the stored blocks are inserted, already stored logs are skipped.
    pub async fn replay(&self, from_block: u64) -> Result<(), LogPollerError> {
        let _guard = self.poll_lock.lock().await;
        let latest = self.db.latest_block()?.ok_or(LogPollerError::NoBlocks)?;
        if from_block > latest.block_number {
            return Err(LogPollerError::InvalidReplayBlock {
                from: from_block,
                latest: latest.block_number,
            });
        }

        let filters = self.filters.read().await.clone();
        if filters.is_empty() {
            return Ok(());
        }
        let (addresses, event_sigs) = watched(&filters);

        info!(
            target: "log_poller",
            chain_id = self.chain_id,
            from_block,
            to_block = latest.block_number,
            "Replaying logs"
        );

        let mut start = from_block;
        while start <= latest.block_number {
            let end = self.range_end(start, latest.block_number);
            let blocks = self.db.blocks_range(start, end)?;
            let stored: HashMap<u64, B256> =
                blocks.iter().map(|block| (block.block_number, block.block_hash)).collect();

            let logs: Vec<Log> = select(
                &filters,
                self.client.logs_in_range(start, end, &addresses, &event_sigs).await?,
            )
            .into_iter()
            .filter(|log| stored.get(&log.block_number).is_none_or(|hash| *hash == log.block_hash))
            .collect();
            let logs = self
                .stamp_timestamps(
                    logs,
                    blocks.iter().map(|block| (block.block_number, block.block_timestamp)).collect(),
                )
                .await?;

            self.db.insert_logs(&logs)?;
            debug!(target: "log_poller", start, end, logs = logs.len(), "Replayed range");
            start = end + 1;
        }
        Ok(())
    }

    /// Polls every `poll_period` until `cancellation` fires.
    pub async fn run(&self, cancellation: CancellationToken) {
        info!(target: "log_poller", chain_id = self.chain_id, "Starting log poller");
        match self.load_filters().await {
            Ok(count) => info!(target: "log_poller", count, "Loaded filters"),
            Err(err) => error!(target: "log_poller", %err, "Failed to load filters"),
        }

        let mut ticker = tokio::time::interval(self.config.poll_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    info!(target: "log_poller", "Log poller cancellation requested, stopping...");
                    break;
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = cancellation.cancelled() => {
                            info!(target: "log_poller", "Log poller cancellation requested, stopping...");
                            break;
                        }
                        result = self.poll_and_save_logs() => {
                            if let Err(err) = result {
                                self.metrics.record_poll_error();
                                error!(target: "log_poller", chain_id = self.chain_id, %err, "Poll failed");
                            }
                        }
                    }
                }
            }
        }
    }

    /// Returns the next block to ingest after `last`, unwinding the store first if `last` was
    /// reorged out.
    ///
    /// When the remote head is not above `last`, the stored block at the head height must carry
    /// the head hash. A remote chain that is shorter but agrees with the store is only lagging.
    async fn check_reorg(
        &self,
        last: &LogPollerBlock,
        head: &ChainHead,
    ) -> Result<u64, LogPollerError> {
        let next = last.block_number + 1;
        if last.block_number < head.latest.number {
            return match self.client.header_by_number(next).await? {
                Some(header) if header.parent_hash != last.block_hash => {
                    Ok(self.rewind(last, header.id()).await? + 1)
                }
                _ => Ok(next),
            };
        }

        let canonical = match self.db.block_by_number(head.latest.number)? {
            Some(stored) => stored.block_hash == head.latest.hash,
            // sparse after a backfill, compare the stored tip instead
            None => self
                .client
                .header_by_number(last.block_number)
                .await?
                .is_some_and(|header| header.hash == last.block_hash),
        };
        if canonical {
            return Ok(next);
        }
        Ok(self.rewind(last, head.latest.id()).await? + 1)
    }

    /// Deletes every stored block above the common ancestor of `last` and the remote chain,
    /// returning the ancestor height.
    async fn rewind(
        &self,
        last: &LogPollerBlock,
        remote: BlockNumHash,
    ) -> Result<u64, LogPollerError> {
        self.publish(SyncState::ReorgDetected);
        warn!(
            target: "log_poller",
            chain_id = self.chain_id,
            stored = ?last.id(),
            remote = ?remote,
            "Reorg detected"
        );

        let ancestor = find_common_ancestor(self.client.as_ref(), self.db.as_ref(), last).await?;
        self.db.delete_logs_and_blocks_after(ancestor + 1)?;

        let depth = last.block_number - ancestor;
        self.metrics.record_reorg(depth);
        self.publish(SyncState::RecoveringFromReorg);
        info!(target: "log_poller", chain_id = self.chain_id, ancestor, depth, "Unwound reorged blocks");
        Ok(ancestor)
    }

    /// Ingests the finalized blocks from `next` in ranges, returning the next block to ingest.
    async fn backfill(
        &self,
        mut next: u64,
        head: &ChainHead,
        filters: &BTreeMap<String, Filter>,
        addresses: &[Address],
        event_sigs: &[B256],
    ) -> Result<u64, LogPollerError> {
        let finalized = head.finalized_number.min(head.latest.number);
        while next <= finalized {
            let end = self.range_end(next, finalized);
            let header =
                self.client.header_by_number(end).await?.ok_or(LogPollerError::MissingBlock(end))?;
            let logs = select(
                filters,
                self.client.logs_in_range(next, end, addresses, event_sigs).await?,
            );
            let logs =
                self.stamp_timestamps(logs, HashMap::from([(header.number, header.timestamp)])).await?;

            let block = self.block_from_header(&header, head.finalized_number);
            self.db.insert_logs_with_block(&logs, &block)?;
            self.record_progress(end - next + 1, logs.len(), end);

            info!(
                target: "log_poller",
                chain_id = self.chain_id,
                from_block = next,
                to_block = end,
                logs = logs.len(),
                "Backfilled finalized blocks"
            );
            next = end + 1;
        }
        Ok(next)
    }

    /// Ingests the blocks from `next` up to the head one at a time.
    async fn ingest_tail(
        &self,
        mut next: u64,
        head: &ChainHead,
        filters: &BTreeMap<String, Filter>,
        addresses: &[Address],
        event_sigs: &[B256],
    ) -> Result<(), LogPollerError> {
        while next <= head.latest.number {
            let Some(header) = self.client.header_by_number(next).await? else {
                debug!(target: "log_poller", block_number = next, "Block not available yet");
                break;
            };

            let parent = match next.checked_sub(1) {
                Some(number) => self.db.block_by_number(number)?,
                None => None,
            };
            if let Some(parent) = parent.filter(|p| p.block_hash != header.parent_hash) {
                next = self.rewind(&parent, header.id()).await? + 1;
                continue;
            }

            let logs = self.client.logs_by_block_hash(header.hash, addresses, event_sigs).await?;
            if let Some(orphan) = logs.iter().find(|log| !log.is_in_block(header.number, header.hash)) {
                return Err(LogPollerError::OrphanedLogs {
                    expected: header.id(),
                    got: BlockNumHash { number: orphan.block_number, hash: orphan.block_hash },
                });
            }
            let logs: Vec<Log> = select(filters, logs)
                .into_iter()
                .map(|log| Log { block_timestamp: header.timestamp, ..log })
                .collect();

            let block = self.block_from_header(&header, head.finalized_number);
            self.db.insert_logs_with_block(&logs, &block)?;
            self.record_progress(1, logs.len(), header.number);

            debug!(
                target: "log_poller",
                chain_id = self.chain_id,
                block_number = header.number,
                logs = logs.len(),
                "Ingested block"
            );
            next += 1;
        }
        Ok(())
    }

    /// Sets the timestamp of every log to the one of its block.
    ///
    /// `eth_getLogs` only returns `blockTimestamp` on some nodes, so the headers missing from
    /// `timestamps` are fetched.
    async fn stamp_timestamps(
        &self,
        logs: Vec<Log>,
        mut timestamps: HashMap<u64, u64>,
    ) -> Result<Vec<Log>, LogPollerError> {
        let numbers: BTreeSet<u64> = logs.iter().map(|log| log.block_number).collect();
        for number in numbers {
            if let Entry::Vacant(entry) = timestamps.entry(number) {
                let header = self
                    .client
                    .header_by_number(number)
                    .await?
                    .ok_or(LogPollerError::MissingBlock(number))?;
                entry.insert(header.timestamp);
            }
        }
        Ok(logs
            .into_iter()
            .map(|log| Log {
                block_timestamp: timestamps
                    .get(&log.block_number)
                    .copied()
                    .unwrap_or(log.block_timestamp),
                ..log
            })
            .collect())
    }

    fn range_end(&self, start: u64, limit: u64) -> u64 {
        start.saturating_add(self.config.backfill_batch_size.max(1) - 1).min(limit)
    }

    const fn block_from_header(&self, header: &BlockHeader, finalized: u64) -> LogPollerBlock {
        LogPollerBlock {
            chain_id: self.chain_id,
            block_hash: header.hash,
            block_number: header.number,
            block_timestamp: header.timestamp,
            finalized_block_number: finalized,
            created_at: 0,
        }
    }

    fn record_progress(&self, blocks: u64, logs: usize, latest: u64) {
        self.metrics.record_blocks_processed(blocks);
        self.metrics.record_logs_inserted(logs as u64);
        self.metrics.set_latest_block(latest);
    }

    fn publish(&self, state: SyncState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            debug!(target: "log_poller", from = %current, to = %state, "Sync state changed");
            *current = state;
            true
        });
    }
}

#[async_trait]
impl<C, DB> LogSource for LogPoller<C, DB>
where
    C: ChainClient,
    DB: LogStore,
{
    async fn latest_block(&self) -> Result<LogPollerBlock, LogPollerError> {
        self.db.latest_block()?.ok_or(LogPollerError::NoBlocks)
    }

    async fn logs_with_sigs(
        &self,
        start: u64,
        end: u64,
        event_sigs: &[B256],
        address: Address,
    ) -> Result<Vec<Log>, LogPollerError> {
        Ok(self.db.select_logs_with_sigs(start, end, address, event_sigs)?)
    }

    async fn blocks_range(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<LogPollerBlock>, LogPollerError> {
        Ok(self.db.blocks_range(start, end)?)
    }
}

/// Returns the union of the addresses and event signatures of `filters`.
fn watched(filters: &BTreeMap<String, Filter>) -> (Vec<Address>, Vec<B256>) {
    let addresses: BTreeSet<Address> =
        filters.values().flat_map(|f| f.addresses.iter().copied()).collect();
    let event_sigs: BTreeSet<B256> =
        filters.values().flat_map(|f| f.event_sigs.iter().copied()).collect();
    (addresses.into_iter().collect(), event_sigs.into_iter().collect())
}

/// Keeps the logs matched by at least one filter.
fn select(filters: &BTreeMap<String, Filter>, logs: Vec<Log>) -> Vec<Log> {
    logs.into_iter().filter(|log| filters.values().any(|f| f.matches(log))).collect()
}
