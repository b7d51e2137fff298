//! CLI flags.

mod globals;
pub(crate) use globals::GlobalArgs;

mod metrics;
pub(crate) use metrics::MetricsArgs;

mod rpc;
pub(crate) use rpc::RpcArgs;

mod poller;
pub(crate) use poller::PollerArgs;
