//! Chain RPC arguments.

use clap::Args;
use logpoller_core::{ClientConfig, DEFAULT_RPC_TIMEOUT};
use std::time::Duration;
use url::Url;

/// Arguments of the JSON-RPC connection to the chain.
#[derive(Args, Debug, Clone)]
pub(crate) struct RpcArgs {
    /// HTTP endpoint of the chain node.
    #[arg(long = "rpc-url", env = "LOGPOLLER_RPC_URL")]
    pub(crate) rpc_url: Url,
    /// Timeout of a single RPC call, in seconds.
    #[arg(long = "rpc.timeout", default_value_t = DEFAULT_RPC_TIMEOUT.as_secs(), env = "LOGPOLLER_RPC_TIMEOUT")]
    pub(crate) timeout: u64,
    /// Derive finality from a fixed depth instead of the `finalized` block tag.
    #[arg(long = "rpc.no-finality-tag", env = "LOGPOLLER_NO_FINALITY_TAG")]
    pub(crate) no_finality_tag: bool,
    /// Depth at which blocks are final when the `finalized` tag is not used.
    #[arg(long = "rpc.finality-depth", default_value_t = 50, env = "LOGPOLLER_FINALITY_DEPTH")]
    pub(crate) finality_depth: u64,
}

impl RpcArgs {
    pub(crate) const fn client_config(&self) -> ClientConfig {
        ClientConfig {
            rpc_timeout: Duration::from_secs(self.timeout),
            use_finality_tag: !self.no_finality_tag,
            finality_depth: self.finality_depth,
        }
    }
}
