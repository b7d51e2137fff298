//! In-memory doubles shared by the unit tests of this crate.

use crate::{BlockHeader, ChainClient, ChainHead, ClientError, LogPollerError, LogSource, MetricsSink};
use alloy_eips::BlockNumHash;
use alloy_primitives::{Address, B256, Bytes, ChainId, keccak256};
use async_trait::async_trait;
use logpoller_types::{Log, LogPollerBlock};
use std::{
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

/// Builds a log of `address` with the given topics; block fields are filled in when mined.
pub(crate) fn log(address: Address, topics: Vec<B256>) -> Log {
    Log {
        address,
        event_sig: topics.first().copied().unwrap_or_default(),
        topics,
        data: Bytes::from(vec![0u8; 32]),
        ..Default::default()
    }
}

#[derive(Debug, Default)]
struct ChainState {
    headers: Vec<BlockHeader>,
    logs: Vec<Vec<Log>>,
    finalized: u64,
    fork: u64,
    orphaned_block: Option<u64>,
}

/// A remote chain whose blocks, forks and finality are driven by the test.
#[derive(Debug)]
pub(crate) struct ScriptedChain {
    chain_id: ChainId,
    state: Mutex<ChainState>,
    offline: AtomicBool,
}

impl ScriptedChain {
    /// Creates a chain holding only its genesis block.
    pub(crate) fn new(chain_id: ChainId) -> Self {
        let chain = Self { chain_id, state: Mutex::default(), offline: AtomicBool::new(false) };
        chain.mine(vec![]);
        chain
    }

    pub(crate) const fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Appends a block holding `logs`.
    pub(crate) fn mine(&self, logs: Vec<Log>) -> BlockHeader {
        let mut state = self.state.lock().unwrap();
        let number = state.headers.len() as u64;
        let parent_hash = state.headers.last().map(|h| h.hash).unwrap_or_default();
        let hash = keccak256([state.fork.to_be_bytes(), number.to_be_bytes()].concat());
        let header = BlockHeader::new(number, hash, parent_hash, 1_000 + number * 2);

        let logs = logs
            .into_iter()
            .enumerate()
            .map(|(index, log)| Log {
                chain_id: self.chain_id,
                block_hash: hash,
                block_number: number,
                block_timestamp: header.timestamp,
                log_index: index as u64,
                tx_hash: keccak256([hash.as_slice(), &(index as u64).to_be_bytes()[..]].concat()),
                ..log
            })
            .collect();

        state.headers.push(header);
        state.logs.push(logs);
        header
    }

    /// Appends `count` blocks without logs.
    pub(crate) fn mine_empty(&self, count: u64) {
        for _ in 0..count {
            self.mine(vec![]);
        }
    }

    /// Drops every block at or above `number`; blocks mined afterwards get new hashes.
    pub(crate) fn fork_at(&self, number: u64) {
        let mut state = self.state.lock().unwrap();
        state.headers.truncate(number as usize);
        state.logs.truncate(number as usize);
        state.fork += 1;
    }

    pub(crate) fn finalize(&self, number: u64) {
        self.state.lock().unwrap().finalized = number;
    }

    pub(crate) fn header(&self, number: u64) -> Option<BlockHeader> {
        self.state.lock().unwrap().headers.get(number as usize).copied()
    }

    pub(crate) fn logs(&self, number: u64) -> Vec<Log> {
        self.state.lock().unwrap().logs.get(number as usize).cloned().unwrap_or_default()
    }

    /// Makes every call fail with a timeout.
    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Serves the logs of `number` as if they belonged to another fork.
    pub(crate) fn serve_orphaned_logs(&self, number: Option<u64>) {
        self.state.lock().unwrap().orphaned_block = number;
    }

    fn ensure_online(&self) -> Result<(), ClientError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::Timeout(Duration::from_secs(10)));
        }
        Ok(())
    }
}

fn selected(log: &Log, addresses: &[Address], event_sigs: &[B256]) -> bool {
    (addresses.is_empty() || addresses.contains(&log.address)) &&
        (event_sigs.is_empty() || event_sigs.contains(&log.event_sig))
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn chain_head(&self) -> Result<ChainHead, ClientError> {
        self.ensure_online()?;
        let state = self.state.lock().unwrap();
        let latest = state.headers.last().copied().unwrap_or_default();
        Ok(ChainHead::new(latest, state.finalized.min(latest.number)))
    }

    async fn header_by_number(&self, number: u64) -> Result<Option<BlockHeader>, ClientError> {
        self.ensure_online()?;
        Ok(self.header(number))
    }

    async fn logs_in_range(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &[Address],
        event_sigs: &[B256],
    ) -> Result<Vec<Log>, ClientError> {
        self.ensure_online()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .logs
            .iter()
            .flatten()
            .filter(|log| (from_block..=to_block).contains(&log.block_number))
            .filter(|log| selected(log, addresses, event_sigs))
            .cloned()
            .collect())
    }

    async fn logs_by_block_hash(
        &self,
        block_hash: B256,
        addresses: &[Address],
        event_sigs: &[B256],
    ) -> Result<Vec<Log>, ClientError> {
        self.ensure_online()?;
        let state = self.state.lock().unwrap();
        let Some(header) = state.headers.iter().find(|h| h.hash == block_hash) else {
            return Ok(vec![]);
        };
        let orphaned = state.orphaned_block == Some(header.number);
        Ok(state.logs[header.number as usize]
            .iter()
            .filter(|log| selected(log, addresses, event_sigs))
            .cloned()
            .map(|log| if orphaned { Log { block_hash: B256::repeat_byte(0xee), ..log } } else { log })
            .collect())
    }

    async fn tx_block(&self, tx_hash: B256) -> Result<Option<BlockNumHash>, ClientError> {
        self.ensure_online()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .logs
            .iter()
            .flatten()
            .find(|log| log.tx_hash == tx_hash)
            .map(|log| BlockNumHash { number: log.block_number, hash: log.block_hash }))
    }
}

/// A [`LogSource`] over a fixed set of blocks and logs.
#[derive(Debug, Default)]
pub(crate) struct MemoryLogSource {
    blocks: Mutex<Vec<LogPollerBlock>>,
    logs: Mutex<Vec<Log>>,
}

impl MemoryLogSource {
    /// Creates a source holding blocks `0..=latest`, `block_time` seconds apart.
    pub(crate) fn with_blocks(latest: u64, block_time: u64) -> Self {
        let source = Self::default();
        source.extend_to(latest, block_time);
        source
    }

    /// Appends blocks up to `latest`.
    pub(crate) fn extend_to(&self, latest: u64, block_time: u64) {
        let mut blocks = self.blocks.lock().unwrap();
        let next = blocks.last().map_or(0, |b| b.block_number + 1);
        for number in next..=latest {
            blocks.push(LogPollerBlock {
                chain_id: 1,
                block_hash: Self::block_hash(number),
                block_number: number,
                block_timestamp: number * block_time,
                finalized_block_number: number.saturating_sub(10),
                created_at: 0,
            });
        }
    }

    pub(crate) fn block_hash(number: u64) -> B256 {
        keccak256(number.to_be_bytes())
    }

    /// Adds a log of `address` at `number`, returning it with its block fields set.
    pub(crate) fn add_log(&self, number: u64, address: Address, topics: Vec<B256>) -> Log {
        let mut logs = self.logs.lock().unwrap();
        let index = logs.iter().filter(|l| l.block_number == number).count() as u64;
        let log = Log {
            chain_id: 1,
            block_hash: Self::block_hash(number),
            block_number: number,
            log_index: index,
            tx_hash: keccak256([number.to_be_bytes(), index.to_be_bytes()].concat()),
            ..log(address, topics)
        };
        logs.push(log.clone());
        log
    }
}

#[async_trait]
impl LogSource for MemoryLogSource {
    async fn latest_block(&self) -> Result<LogPollerBlock, LogPollerError> {
        self.blocks.lock().unwrap().last().copied().ok_or(LogPollerError::NoBlocks)
    }

    async fn logs_with_sigs(
        &self,
        start: u64,
        end: u64,
        event_sigs: &[B256],
        address: Address,
    ) -> Result<Vec<Log>, LogPollerError> {
        let logs = self.logs.lock().unwrap();
        Ok(logs
            .iter()
            .filter(|l| (start..=end).contains(&l.block_number))
            .filter(|l| l.address == address && event_sigs.contains(&l.event_sig))
            .cloned()
            .collect())
    }

    async fn blocks_range(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<LogPollerBlock>, LogPollerError> {
        let blocks = self.blocks.lock().unwrap();
        Ok(blocks.iter().filter(|b| (start..=end).contains(&b.block_number)).copied().collect())
    }
}

/// A [`MetricsSink`] counting what it receives.
#[derive(Debug, Default)]
pub(crate) struct RecordingMetrics {
    pub(crate) reorgs: AtomicU64,
    pub(crate) reorg_depth: AtomicU64,
    pub(crate) poll_errors: AtomicU64,
    pub(crate) latest_block: AtomicU64,
    pub(crate) missed_logs: AtomicU64,
}

impl MetricsSink for RecordingMetrics {
    fn record_reorg(&self, depth: u64) {
        self.reorgs.fetch_add(1, Ordering::SeqCst);
        self.reorg_depth.store(depth, Ordering::SeqCst);
    }

    fn record_poll_error(&self) {
        self.poll_errors.fetch_add(1, Ordering::SeqCst);
    }

    fn set_latest_block(&self, number: u64) {
        self.latest_block.store(number, Ordering::SeqCst);
    }

    fn record_missed_logs(&self, count: usize) {
        self.missed_logs.fetch_add(count as u64, Ordering::SeqCst);
    }
}
