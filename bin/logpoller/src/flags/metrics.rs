//! Prometheus metrics CLI args.

use clap::Args;
use std::net::{IpAddr, Ipv4Addr};

/// Configuration for the Prometheus metrics server.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub(crate) struct MetricsArgs {
    /// Controls whether Prometheus metrics are enabled.
    #[arg(
        long = "metrics.enabled",
        global = true,
        default_value_t = false,
        env = "LOGPOLLER_METRICS_ENABLED"
    )]
    pub(crate) enabled: bool,

    /// The address to bind the metrics server to.
    #[arg(
        long = "metrics.addr",
        global = true,
        default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        env = "LOGPOLLER_METRICS_ADDR"
    )]
    pub(crate) addr: IpAddr,

    /// The port to serve metrics on.
    #[arg(long = "metrics.port", global = true, default_value_t = 9090, env = "LOGPOLLER_METRICS_PORT")]
    pub(crate) port: u16,
}
