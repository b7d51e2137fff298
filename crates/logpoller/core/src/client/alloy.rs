use crate::{BlockHeader, ChainClient, ChainHead, ClientConfig, ClientError};
use alloy_eips::{BlockNumHash, BlockNumberOrTag};
use alloy_network::{Ethereum, ReceiptResponse};
use alloy_primitives::{Address, B256, ChainId};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types_eth::{Filter as RpcFilter, Header, Log as RpcLog};
use alloy_transport::TransportResult;
use async_trait::async_trait;
use logpoller_types::Log;
use std::future::IntoFuture;
use tracing::{debug, trace};
use url::Url;

/// [`ChainClient`] over an Ethereum JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct AlloyChainClient {
    chain_id: ChainId,
    provider: RootProvider<Ethereum>,
    config: ClientConfig,
}

impl AlloyChainClient {
    /// Creates a client over an existing provider.
    pub const fn new(chain_id: ChainId, provider: RootProvider<Ethereum>, config: ClientConfig) -> Self {
        Self { chain_id, provider, config }
    }

    /// Creates a client connected to `url` over HTTP.
    pub fn new_http(chain_id: ChainId, url: Url, config: ClientConfig) -> Self {
        Self::new(chain_id, RootProvider::new_http(url), config)
    }

    /// Runs an RPC call bounded by the configured timeout.
    async fn call<T, F>(&self, request: F) -> Result<T, ClientError>
    where
        F: IntoFuture<Output = TransportResult<T>>,
    {
        tokio::time::timeout(self.config.rpc_timeout, request)
            .await
            .map_err(|_| ClientError::Timeout(self.config.rpc_timeout))?
            .map_err(ClientError::from)
    }

    async fn header(&self, tag: BlockNumberOrTag) -> Result<Option<BlockHeader>, ClientError> {
        let block = self.call(self.provider.get_block_by_number(tag)).await?;
        Ok(block.map(|block| header_from_rpc(block.header)))
    }

    async fn logs(&self, filter: RpcFilter) -> Result<Vec<Log>, ClientError> {
        let logs = self.call(self.provider.get_logs(&filter)).await?;
        trace!(target: "log_poller", count = logs.len(), "Fetched logs");
        logs.into_iter()
            .filter(|log| !log.removed)
            .map(|log| log_from_rpc(self.chain_id, log))
            .collect()
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn chain_head(&self) -> Result<ChainHead, ClientError> {
        let latest = self
            .header(BlockNumberOrTag::Latest)
            .await?
            .ok_or(ClientError::BlockNotFound(BlockNumberOrTag::Latest))?;

        let finalized_number = if self.config.use_finality_tag {
            self.header(BlockNumberOrTag::Finalized)
                .await?
                .ok_or(ClientError::BlockNotFound(BlockNumberOrTag::Finalized))?
                .number
        } else {
            latest.number.saturating_sub(self.config.finality_depth)
        };

        debug!(
            target: "log_poller",
            chain_id = self.chain_id,
            latest = latest.number,
            finalized = finalized_number,
            "Fetched chain head"
        );
        Ok(ChainHead::new(latest, finalized_number.min(latest.number)))
    }

    async fn header_by_number(&self, number: u64) -> Result<Option<BlockHeader>, ClientError> {
        self.header(BlockNumberOrTag::Number(number)).await
    }

    async fn logs_in_range(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &[Address],
        event_sigs: &[B256],
    ) -> Result<Vec<Log>, ClientError> {
        let filter = RpcFilter::new()
            .address(addresses.to_vec())
            .event_signature(event_sigs.to_vec())
            .from_block(from_block)
            .to_block(to_block);
        self.logs(filter).await
    }

    async fn logs_by_block_hash(
        &self,
        block_hash: B256,
        addresses: &[Address],
        event_sigs: &[B256],
    ) -> Result<Vec<Log>, ClientError> {
        let filter = RpcFilter::new()
            .address(addresses.to_vec())
            .event_signature(event_sigs.to_vec())
            .at_block_hash(block_hash);
        self.logs(filter).await
    }

    async fn tx_block(&self, tx_hash: B256) -> Result<Option<BlockNumHash>, ClientError> {
        let Some(receipt) = self.call(self.provider.get_transaction_receipt(tx_hash)).await? else {
            return Ok(None);
        };
        match (receipt.block_number(), receipt.block_hash()) {
            (Some(number), Some(hash)) => Ok(Some(BlockNumHash { number, hash })),
            // pending transactions have no block yet
            _ => Ok(None),
        }
    }
}

fn header_from_rpc(header: Header) -> BlockHeader {
    let Header { hash, inner: alloy_consensus::Header { number, parent_hash, timestamp, .. }, .. } =
        header;
    BlockHeader::new(number, hash, parent_hash, timestamp)
}

fn log_from_rpc(chain_id: ChainId, log: RpcLog) -> Result<Log, ClientError> {
    let block_hash = log.block_hash.ok_or(ClientError::MissingField("blockHash"))?;
    let block_number = log.block_number.ok_or(ClientError::MissingField("blockNumber"))?;
    let tx_hash = log.transaction_hash.ok_or(ClientError::MissingField("transactionHash"))?;
    let log_index = log.log_index.ok_or(ClientError::MissingField("logIndex"))?;
    let topics = log.topics().to_vec();

    Ok(Log {
        chain_id,
        block_hash,
        block_number,
        block_timestamp: log.block_timestamp.unwrap_or_default(),
        log_index,
        address: log.address(),
        event_sig: topics.first().copied().unwrap_or_default(),
        topics,
        data: log.data().data.clone(),
        tx_hash,
        created_at: 0,
    })
}
