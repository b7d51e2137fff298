//! Contains the logpoller CLI.

use crate::{
    commands::{FilterCommand, NodeCommand, PruneCommand, ReplayCommand},
    flags::GlobalArgs,
    telemetry,
};
use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

/// Subcommands for the CLI.
#[derive(Debug, Clone, Subcommand)]
pub(crate) enum Commands {
    /// Follows the chain and stores the logs of the registered filters.
    #[command(alias = "n")]
    Node(NodeCommand),
    /// Registers, removes or lists log filters.
    #[command(subcommand)]
    Filter(FilterCommand),
    /// Deletes old blocks and expired logs.
    Prune(PruneCommand),
    /// Re-fetches the logs of an already ingested range.
    Replay(ReplayCommand),
}

/// The logpoller CLI.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Verbosity level (0-3)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub(crate) v: u8,
    /// Global arguments for the CLI.
    #[command(flatten)]
    pub(crate) global: GlobalArgs,
    /// The subcommand to run.
    #[command(subcommand)]
    pub(crate) subcommand: Commands,
}

impl Cli {
    /// Runs the CLI.
    pub(crate) async fn run(self) -> Result<()> {
        telemetry::init_tracing(self.v)?;

        match self.subcommand {
            Commands::Node(node) => {
                telemetry::init_prometheus(&self.global.metrics)?;
                node.run(&self.global).await
            }
            Commands::Filter(filter) => filter.run(&self.global),
            Commands::Prune(prune) => prune.run(&self.global),
            Commands::Replay(replay) => replay.run(&self.global).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node() {
        let cli = Cli::try_parse_from([
            "logpoller",
            "-vv",
            "--datadir",
            "/tmp/logpoller",
            "node",
            "--rpc-url",
            "http://localhost:8545",
        ])
        .unwrap();
        assert_eq!(cli.v, 2);
        assert!(matches!(cli.subcommand, Commands::Node(_)));
    }

    #[test]
    fn test_parse_replay_requires_from() {
        let err = Cli::try_parse_from([
            "logpoller",
            "--datadir",
            "/tmp/logpoller",
            "replay",
            "--rpc-url",
            "http://localhost:8545",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_parse_prune() {
        let cli = Cli::try_parse_from([
            "logpoller",
            "--datadir",
            "/tmp/logpoller",
            "prune",
            "--keep-blocks",
            "1000",
        ])
        .unwrap();
        let Commands::Prune(prune) = cli.subcommand else { panic!("expected prune") };
        assert_eq!(prune.keep_blocks, 1000);
    }
}
