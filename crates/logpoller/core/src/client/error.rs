use alloy_eips::BlockNumberOrTag;
use alloy_transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by a [`ChainClient`](crate::ChainClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The RPC call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The RPC call did not complete in time.
    #[error("rpc call timed out after {0:?}")]
    Timeout(Duration),

    /// The node does not know the requested block.
    #[error("block {0} not found")]
    BlockNotFound(BlockNumberOrTag),

    /// The node returned an object without a required field.
    #[error("rpc response is missing `{0}`")]
    MissingField(&'static str),
}
