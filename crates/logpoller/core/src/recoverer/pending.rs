//! The recoverer's pending payloads, owned by a single task.

use crate::RecoveryError;
use alloy_primitives::keccak256;
use logpoller_types::{UpkeepId, UpkeepPayload, UpkeepState, WorkId};
use std::{collections::HashMap, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};
use tracing::{debug, info, warn};

/// Capacity of the command channel of the pending queue task.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Result of queueing a batch of recovered payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct PopulateOutcome {
    /// Payloads newly queued.
    pub(crate) added: usize,
    /// Payloads already queued for recovery.
    pub(crate) already_pending: usize,
    /// Payloads rejected because their upkeep hit its cap.
    pub(crate) rejected: usize,
    /// Pending payloads after the call.
    pub(crate) pending: usize,
}

/// Result of expiring visited payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ExpireOutcome {
    /// Entries dropped for good.
    pub(crate) removed: usize,
    /// Entries queued again with a fresh timestamp.
    pub(crate) requeued: usize,
    /// Pending payloads after the call.
    pub(crate) pending: usize,
}

#[derive(Debug, Clone)]
struct VisitedRecord {
    visited_at: Instant,
    payload: UpkeepPayload,
}

/// Pending payloads in proposal order, plus every payload queued for recovery.
#[derive(Debug)]
pub(crate) struct PendingQueue {
    keys: Vec<WorkId>,
    payloads: HashMap<WorkId, UpkeepPayload>,
    counts: HashMap<UpkeepId, usize>,
    visited: HashMap<WorkId, VisitedRecord>,
    max_per_upkeep: usize,
}

impl PendingQueue {
    pub(crate) fn new(max_per_upkeep: usize) -> Self {
        Self {
            keys: Vec::new(),
            payloads: HashMap::new(),
            counts: HashMap::new(),
            visited: HashMap::new(),
            max_per_upkeep,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    /// Queues `payload` unless its upkeep already holds `max_per_upkeep` pending payloads.
    fn add_pending(&mut self, payload: UpkeepPayload) -> Result<(), RecoveryError> {
        let count = self.counts.entry(payload.upkeep_id).or_default();
        if *count >= self.max_per_upkeep {
            return Err(RecoveryError::TooManyPending(payload.upkeep_id));
        }
        if !self.payloads.contains_key(&payload.work_id) {
            *count += 1;
            self.keys.push(payload.work_id);
            self.payloads.insert(payload.work_id, payload);
        }
        Ok(())
    }

    fn remove_pending(&mut self, payload: &UpkeepPayload) {
        if self.payloads.remove(&payload.work_id).is_some() {
            self.keys.retain(|id| *id != payload.work_id);
            self.release(&payload.upkeep_id);
        }
    }

    fn release(&mut self, upkeep_id: &UpkeepId) {
        if let Some(count) = self.counts.get_mut(upkeep_id) {
            *count = count.saturating_sub(1);
        }
    }

    /// Queues payloads not already visited.
    pub(crate) fn populate(&mut self, payloads: Vec<UpkeepPayload>, now: Instant) -> PopulateOutcome {
        let mut outcome = PopulateOutcome::default();
        let before = self.len();
        for payload in payloads {
            if self.visited.contains_key(&payload.work_id) {
                outcome.already_pending += 1;
                continue;
            }
            match self.add_pending(payload.clone()) {
                Ok(()) => {
                    self.visited.insert(payload.work_id, VisitedRecord { visited_at: now, payload });
                }
                Err(err) => {
                    debug!(target: "log_recoverer", %err, "Failed to add payload to pending");
                    outcome.rejected += 1;
                }
            }
        }
        outcome.added = self.len() - before;
        outcome.pending = self.len();
        outcome
    }

    /// Orders the pending payloads by a permutation seeded with the normalized chain height, so
    /// nodes at nearby heights agree on the order.
    fn sort_pending(&mut self, latest_block: u64) {
        let seed = (latest_block / 100).max(1).to_be_bytes();
        self.keys.sort_by_cached_key(|id| keccak256([&seed[..], id.0.as_slice()].concat()));
    }

    /// Drains up to `max` payloads, at most `per_upkeep` of each upkeep. The rest stay pending.
    pub(crate) fn take_proposals(
        &mut self,
        latest_block: u64,
        max: usize,
        per_upkeep: usize,
    ) -> Vec<UpkeepPayload> {
        self.sort_pending(latest_block);

        let mut results = Vec::new();
        let mut taken: HashMap<UpkeepId, usize> = HashMap::new();
        let mut remaining = Vec::with_capacity(self.keys.len());

        for work_id in std::mem::take(&mut self.keys) {
            let Some(payload) = self.payloads.get(&work_id) else { continue };
            let upkeep_taken = taken.entry(payload.upkeep_id).or_default();
            if results.len() >= max || *upkeep_taken >= per_upkeep {
                remaining.push(work_id);
                continue;
            }
            *upkeep_taken += 1;
            if let Some(payload) = self.payloads.remove(&work_id) {
                self.release(&payload.upkeep_id);
                results.push(payload);
            }
        }

        self.keys = remaining;
        results
    }

    /// Returns the visited work ids older than `ttl`, sorted.
    pub(crate) fn expired(&self, now: Instant, ttl: Duration) -> Vec<WorkId> {
        let mut expired: Vec<WorkId> = self
            .visited
            .iter()
            .filter(|(_, record)| now.saturating_duration_since(record.visited_at) > ttl)
            .map(|(id, _)| *id)
            .collect();
        expired.sort();
        expired
    }

    /// Resolves expired entries given their current `states`.
    ///
    /// Terminal entries are dropped. Unresolved entries whose log fell before `window_start` are
    /// dropped as unrecoverable, the others are queued again.
    pub(crate) fn expire(
        &mut self,
        ids: &[WorkId],
        states: &[UpkeepState],
        window_start: u64,
        now: Instant,
    ) -> ExpireOutcome {
        let mut outcome = ExpireOutcome::default();
        for (id, state) in ids.iter().zip(states) {
            let Some(record) = self.visited.get(id).cloned() else { continue };

            if state.is_terminal() {
                self.remove_pending(&record.payload);
                self.visited.remove(id);
                outcome.removed += 1;
                continue;
            }

            let log_block = record
                .payload
                .trigger
                .log_trigger_extension
                .map_or(record.payload.trigger.block_number, |ext| ext.block_number);
            if log_block < window_start {
                debug!(
                    target: "log_recoverer",
                    upkeep_id = %record.payload.upkeep_id,
                    log_block,
                    window_start,
                    "Removing expired log: old block"
                );
                self.remove_pending(&record.payload);
                self.visited.remove(id);
                outcome.removed += 1;
                continue;
            }

            if self.add_pending(record.payload.clone()).is_ok() {
                self.visited.insert(*id, VisitedRecord { visited_at: now, ..record });
                outcome.requeued += 1;
            }
        }
        outcome.pending = self.len();
        outcome
    }
}

#[derive(Debug)]
enum PendingCommand {
    Populate { payloads: Vec<UpkeepPayload>, reply: oneshot::Sender<PopulateOutcome> },
    TakeProposals { latest_block: u64, reply: oneshot::Sender<(Vec<UpkeepPayload>, usize)> },
    Expired { ttl: Duration, reply: oneshot::Sender<Vec<WorkId>> },
    Expire {
        ids: Vec<WorkId>,
        states: Vec<UpkeepState>,
        window_start: u64,
        reply: oneshot::Sender<ExpireOutcome>,
    },
}

/// Task owning the [`PendingQueue`]. It stops once every handle is dropped.
#[derive(Debug)]
pub(crate) struct PendingQueueActor {
    queue: PendingQueue,
    max_proposals: usize,
    allowed_logs_per_upkeep: usize,
    command_rx: mpsc::Receiver<PendingCommand>,
}

impl PendingQueueActor {
    pub(crate) fn new(
        max_per_upkeep: usize,
        max_proposals: usize,
        allowed_logs_per_upkeep: usize,
    ) -> (Self, PendingQueueHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let actor = Self {
            queue: PendingQueue::new(max_per_upkeep),
            max_proposals,
            allowed_logs_per_upkeep,
            command_rx,
        };
        (actor, PendingQueueHandle { command_tx })
    }

    pub(crate) async fn start(mut self) {
        info!(target: "log_recoverer", "Pending queue started");
        while let Some(command) = self.command_rx.recv().await {
            self.handle(command);
        }
        info!(target: "log_recoverer", pending = self.queue.len(), "Pending queue stopped");
    }

    fn handle(&mut self, command: PendingCommand) {
        // a dropped reply receiver means the caller went away, nothing to do
        match command {
            PendingCommand::Populate { payloads, reply } => {
                let _ = reply.send(self.queue.populate(payloads, Instant::now()));
            }
            PendingCommand::TakeProposals { latest_block, reply } => {
                let proposals = self.queue.take_proposals(
                    latest_block,
                    self.max_proposals,
                    self.allowed_logs_per_upkeep,
                );
                let _ = reply.send((proposals, self.queue.len()));
            }
            PendingCommand::Expired { ttl, reply } => {
                let _ = reply.send(self.queue.expired(Instant::now(), ttl));
            }
            PendingCommand::Expire { ids, states, window_start, reply } => {
                if ids.len() != states.len() {
                    warn!(target: "log_recoverer", ids = ids.len(), states = states.len(), "State count mismatch");
                }
                let outcome = self.queue.expire(&ids, &states, window_start, Instant::now());
                let _ = reply.send(outcome);
            }
        }
    }
}

/// Cloneable handle to the [`PendingQueueActor`].
#[derive(Debug, Clone)]
pub(crate) struct PendingQueueHandle {
    command_tx: mpsc::Sender<PendingCommand>,
}

impl PendingQueueHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> PendingCommand,
    ) -> Result<T, RecoveryError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx.send(command(reply)).await.map_err(|_| RecoveryError::QueueClosed)?;
        rx.await.map_err(|_| RecoveryError::QueueClosed)
    }

    pub(crate) async fn populate(
        &self,
        payloads: Vec<UpkeepPayload>,
    ) -> Result<PopulateOutcome, RecoveryError> {
        self.request(|reply| PendingCommand::Populate { payloads, reply }).await
    }

    pub(crate) async fn take_proposals(
        &self,
        latest_block: u64,
    ) -> Result<(Vec<UpkeepPayload>, usize), RecoveryError> {
        self.request(|reply| PendingCommand::TakeProposals { latest_block, reply }).await
    }

    pub(crate) async fn expired(&self, ttl: Duration) -> Result<Vec<WorkId>, RecoveryError> {
        self.request(|reply| PendingCommand::Expired { ttl, reply }).await
    }

    pub(crate) async fn expire(
        &self,
        ids: Vec<WorkId>,
        states: Vec<UpkeepState>,
        window_start: u64,
    ) -> Result<ExpireOutcome, RecoveryError> {
        self.request(|reply| PendingCommand::Expire { ids, states, window_start, reply }).await
    }
}
