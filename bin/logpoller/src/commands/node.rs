//! Node Subcommand.

use crate::flags::{GlobalArgs, PollerArgs, RpcArgs};
use anyhow::Result;
use clap::Parser;
use logpoller_core::{AlloyChainClient, LogPoller, MetricsSink, NoopMetrics, PrometheusMetrics};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The `node` Subcommand
///
/// Follows the chain head until interrupted, storing the logs of the registered filters.
///
/// # Usage
///
/// ```sh
/// logpoller --datadir ./data node --rpc-url http://localhost:8545 [FLAGS]
/// ```
#[derive(Parser, Debug, Clone)]
#[command(about = "Runs the log poller")]
pub(crate) struct NodeCommand {
    /// Chain RPC arguments.
    #[command(flatten)]
    pub(crate) rpc: RpcArgs,
    /// Poller tuning.
    #[command(flatten)]
    pub(crate) poller: PollerArgs,
}

impl NodeCommand {
    /// Runs the poller until ctrl-c.
    pub(crate) async fn run(self, args: &GlobalArgs) -> Result<()> {
        let db = args.open_db()?;
        let client = Arc::new(AlloyChainClient::new_http(
            args.chain_id,
            self.rpc.rpc_url.clone(),
            self.rpc.client_config(),
        ));
        let metrics: Arc<dyn MetricsSink> = if args.metrics.enabled {
            Arc::new(PrometheusMetrics::new(args.chain_id))
        } else {
            Arc::new(NoopMetrics)
        };

        let poller =
            LogPoller::new(args.chain_id, client, db, self.poller.poller_config(), metrics);
        let filters = poller.load_filters().await?;
        if filters == 0 {
            warn!(target: "log_poller", "No filters registered, nothing will be ingested");
        }
        info!(
            target: "log_poller",
            chain_id = args.chain_id,
            filters,
            rpc_url = %self.rpc.rpc_url,
            "Starting log poller"
        );

        let cancellation = CancellationToken::new();
        let shutdown = cancellation.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(target: "log_poller", %err, "Failed to listen for ctrl-c");
            }
            info!(target: "log_poller", "Received shutdown signal");
            shutdown.cancel();
        });

        poller.run(cancellation).await;
        Ok(())
    }
}
