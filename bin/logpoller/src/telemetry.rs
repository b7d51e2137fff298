//! Tracing and metrics setup.

use crate::flags::MetricsArgs;
use anyhow::{Context as _, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

/// Maps the `-v` count to the default log level. `RUST_LOG` takes precedence.
const fn verbosity_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installs the global tracing subscriber.
pub(crate) fn init_tracing(verbosity: u8) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(verbosity_level(verbosity)).into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow::anyhow!("Failed to install tracing subscriber: {err}"))
}

/// Starts the Prometheus exporter when metrics are enabled.
pub(crate) fn init_prometheus(args: &MetricsArgs) -> Result<()> {
    if !args.enabled {
        return Ok(());
    }
    let addr = SocketAddr::from((args.addr, args.port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to start the metrics server")?;
    info!(target: "prometheus", "Serving metrics at: http://{addr}");
    Ok(())
}
