use crate::RecoveryError;
use async_trait::async_trait;
use logpoller_types::{UpkeepState, WorkId};
use std::fmt::Debug;

/// Read access to the processing state of upkeep work.
#[async_trait]
pub trait UpkeepStateReader: Debug + Send + Sync {
    /// Returns the state of every work id, in the same order.
    async fn select_by_work_ids(&self, work_ids: &[WorkId])
    -> Result<Vec<UpkeepState>, RecoveryError>;
}
