//! Read access to the remote chain.

mod error;
pub use error::ClientError;

mod traits;
pub use traits::{BlockHeader, ChainClient, ChainHead};

mod alloy;
pub use alloy::AlloyChainClient;
