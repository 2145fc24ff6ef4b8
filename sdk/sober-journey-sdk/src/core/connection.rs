use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;

pub type ConnectionError = Box<dyn Error + Send + Sync>;

/// A single log entry as returned by `eth_getLogs` or inside a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    /// `None` while the log belongs to a pending block
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
    pub transaction_hash: Option<B256>,
}

/// Log query over an inclusive block range.
///
/// `topics[i] == None` matches any value at position `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    pub topics: [Option<B256>; 4],
    pub from_block: u64,
    pub to_block: u64,
}

impl LogFilter {
    pub fn new(address: Address, event_signature: B256) -> Self {
        Self {
            address,
            topics: [Some(event_signature), None, None, None],
            from_block: 0,
            to_block: u64::MAX,
        }
    }

    pub fn with_topic(mut self, position: usize, topic: B256) -> Self {
        if position < self.topics.len() {
            self.topics[position] = Some(topic);
        }
        self
    }

    pub fn with_range(mut self, from_block: u64, to_block: u64) -> Self {
        self.from_block = from_block;
        self.to_block = to_block;
        self
    }

    /// Whether `log` satisfies this filter.
    pub fn matches(&self, log: &ChainLog) -> bool {
        if log.address != self.address {
            return false;
        }
        if let Some(block) = log.block_number {
            if block < self.from_block || block > self.to_block {
                return false;
            }
        }
        self.topics.iter().enumerate().all(|(i, expected)| match expected {
            Some(topic) => log.topics.get(i) == Some(topic),
            None => true,
        })
    }
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub success: bool,
    pub logs: Vec<ChainLog>,
}

/// Read-only chain access.
#[async_trait]
pub trait EvmConnection: Send + Sync {
    async fn get_chain_id(&self) -> Result<u64, ConnectionError>;
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ConnectionError>;
    async fn get_block_number(&self) -> Result<u64, ConnectionError>;
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<ChainLog>, ConnectionError>;
}

/// Chain access backed by an account that can send transactions.
#[async_trait]
pub trait EvmWriteConnection: EvmConnection {
    /// Account that pays for and signs submitted transactions
    fn sender(&self) -> Address;

    async fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> Result<B256, ConnectionError>;

    /// Suspends until `tx_hash` is included in a block.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt, ConnectionError>;
}

/// Opens read connections to an RPC endpoint by URL.
pub trait RpcConnector: Send + Sync {
    fn connect(&self, rpc_url: &str) -> Result<Arc<dyn EvmConnection>, ConnectionError>;
}
