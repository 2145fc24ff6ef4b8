use crate::config::{FhevmConfig, MockChainConfig};
use crate::core::connection::RpcConnector;
use crate::error::{JourneySdkError, Result};
use crate::fhevm::instance::{FheInstance, InstanceMode};
use crate::fhevm::mock::{MockCoprocessor, MockFheInstance, MockInstanceConfig};
use crate::fhevm::relayer::{RelayerSdkLoader, SdkModuleLoader};
use alloy_primitives::Bytes;
use sober_journey_interface::{IEip712Domain, SolCall};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

type InstanceCell = Arc<OnceCell<Arc<dyn FheInstance>>>;

struct InstanceSlot {
    chain_id: u64,
    cell: InstanceCell,
}

/// Owns the single FHE instance for the current chain.
///
/// Concurrent callers for the same chain share one in-flight load. Asking
/// for a different chain replaces the slot, so at most one instance is
/// cached at a time.
pub struct InstanceLoader {
    config: FhevmConfig,
    relayer: RelayerSdkLoader,
    connector: Arc<dyn RpcConnector>,
    coprocessor: Arc<MockCoprocessor>,
    slot: Mutex<Option<InstanceSlot>>,
    loads: AtomicUsize,
}

impl InstanceLoader {
    pub fn new(
        config: FhevmConfig,
        module_loader: Arc<dyn SdkModuleLoader>,
        connector: Arc<dyn RpcConnector>,
    ) -> Self {
        let relayer = RelayerSdkLoader::new(module_loader, config.sdk_sources.clone());
        Self {
            config,
            relayer,
            connector,
            coprocessor: Arc::new(MockCoprocessor::new()),
            slot: Mutex::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    /// Share plaintext bookkeeping with a simulated chain
    pub fn with_mock_coprocessor(mut self, coprocessor: Arc<MockCoprocessor>) -> Self {
        self.coprocessor = coprocessor;
        self
    }

    pub fn config(&self) -> &FhevmConfig {
        &self.config
    }

    pub fn relayer(&self) -> &RelayerSdkLoader {
        &self.relayer
    }

    pub fn mock_coprocessor(&self) -> &Arc<MockCoprocessor> {
        &self.coprocessor
    }

    pub fn mode_for(&self, chain_id: u64) -> InstanceMode {
        if self.config.mock_chain(chain_id).is_some() {
            InstanceMode::Mock
        } else {
            InstanceMode::Network
        }
    }

    /// Number of underlying loads started
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub async fn current_chain_id(&self) -> Option<u64> {
        self.slot.lock().await.as_ref().map(|s| s.chain_id)
    }

    /// Instance for `chain_id`, loading it if needed.
    pub async fn get_instance(&self, chain_id: u64) -> Result<Arc<dyn FheInstance>> {
        let cell = {
            let mut slot = self.slot.lock().await;
            let cached = slot
                .as_ref()
                .filter(|current| current.chain_id == chain_id)
                .map(|current| current.cell.clone());
            match cached {
                Some(cell) => cell,
                None => {
                    if let Some(previous) = slot.as_ref() {
                        debug!(
                            from = previous.chain_id,
                            to = chain_id,
                            "Chain changed, dropping cached FHEVM instance"
                        );
                    }
                    let cell = InstanceCell::default();
                    *slot = Some(InstanceSlot {
                        chain_id,
                        cell: cell.clone(),
                    });
                    cell
                },
            }
        };

        let instance = cell.get_or_try_init(|| self.load(chain_id)).await?;
        Ok(instance.clone())
    }

    /// Drop the cached instance for the current chain; the next
    /// `get_instance` starts a fresh load.
    pub async fn refresh(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(current) = slot.as_mut() {
            info!(chain_id = current.chain_id, "Refreshing FHEVM instance");
            current.cell = InstanceCell::default();
        }
    }

    async fn load(&self, chain_id: u64) -> Result<Arc<dyn FheInstance>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let result = match self.config.mock_chain(chain_id) {
            Some(mock) => self.load_mock(mock).await,
            None => self.load_network(chain_id).await,
        };
        match &result {
            Ok(instance) => info!(chain_id, mode = ?instance.mode(), "FHEVM instance ready"),
            Err(e) => warn!(chain_id, "FHEVM instance load failed: {}", e),
        }
        result
    }

    async fn load_network(&self, chain_id: u64) -> Result<Arc<dyn FheInstance>> {
        let network = &self.config.network;
        if network.chain_id != chain_id {
            return Err(JourneySdkError::InstanceLoad(format!(
                "No relayer configuration for chain {}",
                chain_id
            )));
        }

        let sdk = self.relayer.load().await?;
        sdk.init().await.map_err(as_load_error)?;
        sdk.create_instance(network).await.map_err(as_load_error)
    }

    async fn load_mock(&self, mock: &MockChainConfig) -> Result<Arc<dyn FheInstance>> {
        let connection = self.connector.connect(&mock.rpc_url).map_err(|e| {
            JourneySdkError::InstanceLoad(format!("Cannot reach {}: {}", mock.rpc_url, e))
        })?;

        // The InputVerifier's domain decides how input proofs are attested
        let data = Bytes::from(IEip712Domain::eip712DomainCall {}.abi_encode());
        let raw = connection
            .call(mock.addresses.input_verifier, data)
            .await
            .map_err(|e| {
                JourneySdkError::InstanceLoad(format!("eip712Domain() call failed: {}", e))
            })?;
        let domain = IEip712Domain::eip712DomainCall::abi_decode_returns(&raw).map_err(|e| {
            JourneySdkError::InstanceLoad(format!("eip712Domain() returned garbage: {}", e))
        })?;

        let config = MockInstanceConfig {
            chain_id: mock.chain_id,
            addresses: mock.addresses,
            gateway_chain_id: domain.chainId.saturating_to(),
            verifying_contract_decryption: mock.verifying_contract_decryption,
            verifying_contract_input_verification: domain.verifyingContract,
        };
        debug!(
            chain_id = mock.chain_id,
            gateway_chain_id = config.gateway_chain_id,
            "Read InputVerifier EIP-712 domain"
        );

        Ok(Arc::new(MockFheInstance::new(
            config,
            self.coprocessor.clone(),
        )))
    }
}

fn as_load_error(err: JourneySdkError) -> JourneySdkError {
    match err {
        JourneySdkError::InstanceLoad(_) => err,
        other => JourneySdkError::InstanceLoad(other.to_string()),
    }
}
