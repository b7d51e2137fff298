//! Global arguments for the CLI.

use super::MetricsArgs;
use alloy_primitives::ChainId;
use anyhow::{Context as _, Result};
use clap::Args;
use logpoller_storage::{BatchConfig, ChainDb, DEFAULT_BATCH_SIZE, MIN_BATCH_SIZE};
use std::{path::PathBuf, sync::Arc};

/// Global arguments for the CLI.
#[derive(Args, Clone, Debug)]
pub(crate) struct GlobalArgs {
    /// The chain ID to index.
    #[arg(long, short = 'c', global = true, default_value_t = 1, env = "LOGPOLLER_CHAIN_ID")]
    pub(crate) chain_id: ChainId,
    /// Directory holding the chain databases.
    #[arg(long, global = true, env = "LOGPOLLER_DATADIR")]
    pub(crate) datadir: PathBuf,
    /// Number of logs written per transaction.
    #[arg(long = "db.batch-size", global = true, default_value_t = DEFAULT_BATCH_SIZE)]
    pub(crate) batch_size: usize,
    /// Smallest batch tried when a large write fails.
    #[arg(long = "db.min-batch-size", global = true, default_value_t = MIN_BATCH_SIZE)]
    pub(crate) min_batch_size: usize,
    /// Prometheus CLI arguments.
    #[command(flatten)]
    pub(crate) metrics: MetricsArgs,
}

impl GlobalArgs {
    /// Returns the database path of the configured chain.
    pub(crate) fn db_path(&self) -> PathBuf {
        self.datadir.join(format!("chain-{}", self.chain_id))
    }

    /// Opens the database of the configured chain.
    pub(crate) fn open_db(&self) -> Result<Arc<ChainDb>> {
        let path = self.db_path();
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create data directory '{}'", path.display()))?;
        let batch = BatchConfig {
            batch_size: self.batch_size,
            min_batch_size: self.min_batch_size.min(self.batch_size),
            ..Default::default()
        };
        let db = ChainDb::new(self.chain_id, &path)
            .with_context(|| format!("Failed to open database at '{}'", path.display()))?
            .with_batch_config(batch);
        Ok(Arc::new(db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        global: GlobalArgs,
    }

    #[test]
    fn test_db_path_per_chain() {
        let cli = TestCli::try_parse_from(["test", "--datadir", "/data", "-c", "137"]).unwrap();
        assert_eq!(cli.global.db_path(), PathBuf::from("/data/chain-137"));
    }

    #[test]
    fn test_open_db_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let datadir = dir.path().join("nested");
        let cli =
            TestCli::try_parse_from(["test", "--datadir", datadir.to_str().unwrap()]).unwrap();
        let db = cli.global.open_db().unwrap();
        assert_eq!(db.chain_id(), 1);
        assert!(datadir.join("chain-1").exists());
    }
}
