//! Filter Subcommands.

use crate::flags::GlobalArgs;
use alloy_primitives::{Address, B256};
use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use logpoller_storage::FilterStorage;
use logpoller_types::Filter;
use std::time::Duration;
use tracing::info;

/// Manages the filters stored in the database. A running node picks changes up on restart.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum FilterCommand {
    /// Registers a filter, merging it into an existing one of the same name.
    Add(AddFilterArgs),
    /// Removes a filter.
    Remove {
        /// Name of the filter.
        name: String,
    },
    /// Lists the registered filters.
    List,
}

/// Arguments of `filter add`.
#[derive(Args, Debug, Clone)]
pub(crate) struct AddFilterArgs {
    /// Unique name of the filter.
    pub(crate) name: String,
    /// Contract addresses to watch.
    #[arg(long = "address", required = true, value_delimiter = ',')]
    pub(crate) addresses: Vec<Address>,
    /// Event signatures (topic0) to watch.
    #[arg(long = "event-sig", required = true, value_delimiter = ',')]
    pub(crate) event_sigs: Vec<B256>,
    /// Allowed values of topic 1.
    #[arg(long, value_delimiter = ',')]
    pub(crate) topic2: Vec<B256>,
    /// Allowed values of topic 2.
    #[arg(long, value_delimiter = ',')]
    pub(crate) topic3: Vec<B256>,
    /// Allowed values of topic 3.
    #[arg(long, value_delimiter = ',')]
    pub(crate) topic4: Vec<B256>,
    /// Retention of matching logs, in seconds. Zero keeps them forever.
    #[arg(long, default_value_t = 0)]
    pub(crate) retention: u64,
}

impl AddFilterArgs {
    fn filter(self) -> Filter {
        Filter {
            topic2: self.topic2,
            topic3: self.topic3,
            topic4: self.topic4,
            ..Filter::new(self.name, self.addresses, self.event_sigs)
        }
        .with_retention(Duration::from_secs(self.retention))
    }
}

impl FilterCommand {
    pub(crate) fn run(self, args: &GlobalArgs) -> Result<()> {
        let db = args.open_db()?;
        match self {
            Self::Add(add) => {
                let filter = add.filter();
                filter.validate().context("Invalid filter")?;
                let stored = db.insert_filter(&filter).context("Failed to store filter")?;
                info!(
                    target: "log_poller",
                    name = %stored.name,
                    addresses = stored.addresses.len(),
                    event_sigs = stored.event_sigs.len(),
                    "Registered filter"
                );
            }
            Self::Remove { name } => {
                db.delete_filter(&name).context("Failed to delete filter")?;
                info!(target: "log_poller", %name, "Unregistered filter");
            }
            Self::List => {
                for (name, filter) in db.load_filters().context("Failed to load filters")? {
                    println!(
                        "{name}: addresses={:?} event_sigs={:?} retention={}s",
                        filter.addresses,
                        filter.event_sigs,
                        filter.retention.as_secs()
                    );
                }
            }
        }
        Ok(())
    }
}
