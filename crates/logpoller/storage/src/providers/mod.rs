//! Transaction scoped table accessors.

mod block_provider;
pub(crate) use block_provider::BlockProvider;

mod log_provider;
pub(crate) use log_provider::LogProvider;

mod filter_provider;
pub(crate) use filter_provider::FilterProvider;
