//! Contains subcommands for the logpoller.

mod node;
pub(crate) use node::NodeCommand;

mod filter;
pub(crate) use filter::FilterCommand;

mod prune;
pub(crate) use prune::PruneCommand;

mod replay;
pub(crate) use replay::ReplayCommand;
