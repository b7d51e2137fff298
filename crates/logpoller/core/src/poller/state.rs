use derive_more::Display;

/// Synchronization state of a [`LogPoller`](crate::LogPoller) with the remote chain.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Every block up to the remote head is ingested.
    Synced,
    /// Blocks remain to be ingested.
    #[default]
    Behind,
    /// The stored chain diverged from the remote chain.
    ReorgDetected,
    /// Orphaned blocks were removed and the canonical ones are being ingested again.
    RecoveringFromReorg,
}
