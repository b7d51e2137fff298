//! Replay Subcommand.

use crate::flags::{GlobalArgs, PollerArgs, RpcArgs};
use anyhow::{Context as _, Result};
use clap::Parser;
use logpoller_core::{AlloyChainClient, LogPoller, NoopMetrics};
use std::sync::Arc;
use tracing::info;

/// The `replay` Subcommand
///
/// Re-fetches the logs of the registered filters from `--from` up to the latest stored block.
/// Logs already stored are left untouched.
#[derive(Parser, Debug, Clone)]
#[command(about = "Re-fetches the logs of an already ingested range")]
pub(crate) struct ReplayCommand {
    /// First block to replay.
    #[arg(long)]
    pub(crate) from: u64,
    /// Chain RPC arguments.
    #[command(flatten)]
    pub(crate) rpc: RpcArgs,
    /// Poller tuning.
    #[command(flatten)]
    pub(crate) poller: PollerArgs,
}

impl ReplayCommand {
    pub(crate) async fn run(self, args: &GlobalArgs) -> Result<()> {
        let db = args.open_db()?;
        let client = Arc::new(AlloyChainClient::new_http(
            args.chain_id,
            self.rpc.rpc_url.clone(),
            self.rpc.client_config(),
        ));
        let poller = LogPoller::new(
            args.chain_id,
            client,
            db,
            self.poller.poller_config(),
            Arc::new(NoopMetrics),
        );
        poller.load_filters().await?;
        poller
            .replay(self.from)
            .await
            .with_context(|| format!("Failed to replay from block {}", self.from))?;
        info!(target: "log_poller", from = self.from, "Replay complete");
        Ok(())
    }
}
