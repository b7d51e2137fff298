//! Recovery of logs missed by the regular log-trigger provider.

mod error;
pub use error::RecoveryError;

mod traits;
pub use traits::UpkeepStateReader;

mod filters;
pub use filters::{InMemoryUpkeepFilterStore, UpkeepFilter, UpkeepFilterStore};

mod packer;
pub use packer::{AbiLogDataPacker, LogDataPacker, PackerError};

mod block_time;
pub use block_time::BlockTimeResolver;

mod window;

mod pending;

mod log_recoverer;
pub use log_recoverer::LogRecoverer;
