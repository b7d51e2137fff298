//! The `logpoller` binary: follows an EVM chain and stores the logs of the registered filters.

mod cli;
mod commands;
mod flags;
mod telemetry;

use clap::Parser;

#[tokio::main]
async fn main() {
    if let Err(err) = cli::Cli::parse().run().await {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
