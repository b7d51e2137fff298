use crate::{ChainClient, LogPollerError};
use logpoller_storage::LogStore;
use logpoller_types::LogPollerBlock;
use tracing::debug;

/// Returns the height of the highest stored block that is still canonical on the remote chain.
///
/// The search starts at `tip` and never goes below its finalized watermark.
pub(crate) async fn find_common_ancestor<C, DB>(
    client: &C,
    db: &DB,
    tip: &LogPollerBlock,
) -> Result<u64, LogPollerError>
where
    C: ChainClient + ?Sized,
    DB: LogStore + ?Sized,
{
    let floor = tip.finalized_block_number.min(tip.block_number);
    let stored = db.blocks_range(floor, tip.block_number)?;

    for block in stored.iter().rev() {
        let remote = client.header_by_number(block.block_number).await?;
        match remote {
            Some(header) if header.hash == block.block_hash => return Ok(block.block_number),
            _ => {
                debug!(
                    target: "log_poller",
                    block_number = block.block_number,
                    stored = %block.block_hash,
                    remote = ?remote.map(|header| header.hash),
                    "Stored block is not canonical"
                );
            }
        }
    }

    Err(LogPollerError::FinalityViolation {
        number: tip.block_number,
        finalized: tip.finalized_block_number,
    })
}
