use crate::core::connection::{
    ChainLog, ConnectionError, EvmConnection, EvmWriteConnection, LogFilter, RpcConnector,
    TxReceipt,
};
use crate::error::{JourneySdkError, Result};
use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// JSON-RPC connection over alloy's HTTP provider.
#[derive(Clone)]
pub struct AlloyConnection {
    provider: DynProvider,
    sender: Option<Address>,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

impl AlloyConnection {
    /// Read-only connection
    pub fn connect_http(rpc_url: &str) -> Result<Self> {
        let url = parse_url(rpc_url)?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self::from_provider(provider, None))
    }

    /// Connection that signs and sends transactions as `signer`
    pub fn connect_http_with_signer(rpc_url: &str, signer: PrivateKeySigner) -> Result<Self> {
        let url = parse_url(rpc_url)?;
        let sender = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();
        Ok(Self::from_provider(provider, Some(sender)))
    }

    /// Wrap an existing provider. `sender` must be the account its wallet
    /// filler signs for.
    pub fn from_provider(provider: DynProvider, sender: Option<Address>) -> Self {
        Self {
            provider,
            sender,
            poll_interval: DEFAULT_POLL_INTERVAL,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }
}

fn parse_url(rpc_url: &str) -> Result<Url> {
    rpc_url
        .parse()
        .map_err(|e| JourneySdkError::Config(format!("Invalid RPC URL {}: {}", rpc_url, e)))
}

fn to_chain_log(log: &Log) -> ChainLog {
    ChainLog {
        address: log.inner.address,
        topics: log.inner.data.topics().to_vec(),
        data: log.inner.data.data.clone(),
        block_number: log.block_number,
        log_index: log.log_index,
        transaction_hash: log.transaction_hash,
    }
}

fn to_filter(filter: &LogFilter) -> Filter {
    let mut out = Filter::new()
        .address(filter.address)
        .from_block(filter.from_block)
        .to_block(filter.to_block);
    for (position, topic) in filter.topics.iter().enumerate() {
        if let Some(topic) = topic {
            out = match position {
                0 => out.event_signature(*topic),
                1 => out.topic1(*topic),
                2 => out.topic2(*topic),
                _ => out.topic3(*topic),
            };
        }
    }
    out
}

#[async_trait]
impl EvmConnection for AlloyConnection {
    async fn get_chain_id(&self) -> std::result::Result<u64, ConnectionError> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn call(&self, to: Address, data: Bytes) -> std::result::Result<Bytes, ConnectionError> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        Ok(self.provider.call(tx).await?)
    }

    async fn get_block_number(&self) -> std::result::Result<u64, ConnectionError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn get_logs(&self, filter: &LogFilter) -> std::result::Result<Vec<ChainLog>, ConnectionError> {
        let logs = self.provider.get_logs(&to_filter(filter)).await?;
        trace!(count = logs.len(), "eth_getLogs");
        Ok(logs.iter().map(to_chain_log).collect())
    }
}

#[async_trait]
impl EvmWriteConnection for AlloyConnection {
    fn sender(&self) -> Address {
        self.sender.unwrap_or_default()
    }

    async fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> std::result::Result<B256, ConnectionError> {
        let from = self.sender.ok_or("Connection has no signer")?;
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(data)
            .with_value(value);
        let pending = self.provider.send_transaction(tx).await?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> std::result::Result<TxReceipt, ConnectionError> {
        let poll = async {
            loop {
                if let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? {
                    return Ok::<_, ConnectionError>(receipt);
                }
                trace!(%tx_hash, "Receipt not available yet");
                tokio::time::sleep(self.poll_interval).await;
            }
        };
        let receipt = tokio::time::timeout(self.receipt_timeout, poll)
            .await
            .map_err(|_| format!("Timed out waiting for receipt of {}", tx_hash))??;

        let block_number = receipt.block_number.unwrap_or_default();
        debug!(%tx_hash, block_number, success = receipt.status(), "Transaction mined");
        Ok(TxReceipt {
            tx_hash,
            block_number,
            success: receipt.status(),
            logs: receipt.inner.logs().iter().map(to_chain_log).collect(),
        })
    }
}

/// Opens [`AlloyConnection`]s by URL
#[derive(Debug, Default, Clone, Copy)]
pub struct AlloyRpcConnector;

impl RpcConnector for AlloyRpcConnector {
    fn connect(&self, rpc_url: &str) -> std::result::Result<Arc<dyn EvmConnection>, ConnectionError> {
        let connection = AlloyConnection::connect_http(rpc_url)?;
        Ok(Arc::new(connection))
    }
}
