//! Ingestion of logs from the remote chain into the store.

mod error;
pub use error::LogPollerError;

mod state;
pub use state::SyncState;

mod traits;
pub use traits::LogSource;

mod reorg;

mod log_poller;
pub use log_poller::LogPoller;
