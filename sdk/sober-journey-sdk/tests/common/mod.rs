use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{keccak256, Address, Bytes, FixedBytes, B256, U256};
use async_trait::async_trait;
use sober_journey_sdk::config::{FhevmConfig, MockChainConfig, NetworkInstanceConfig};
use sober_journey_sdk::core::connection::{
    ChainLog, ConnectionError, EvmConnection, EvmWriteConnection, LogFilter, RpcConnector,
    TxReceipt,
};
use sober_journey_sdk::core::constants::*;
use sober_journey_sdk::core::signer::JourneySigner;
use sober_journey_sdk::fhevm::instance::{DecryptionTypedData, FheInstance, FhevmAddresses};
use sober_journey_sdk::fhevm::loader::InstanceLoader;
use sober_journey_sdk::fhevm::mock::{
    decode_input_proof, input_attestation, MockCoprocessor, MockFheInstance, MockInstanceConfig,
};
use sober_journey_sdk::fhevm::relayer::{RelayerSdk, SdkModuleLoader};
use sober_journey_sdk::interface::{
    IEip712Domain, ISoberJourneyFHE, ISoberJourneyFHE::ISoberJourneyFHECalls, Journey,
    ParticipantRecord, SolCall, SolEvent, SolInterface,
};
use sober_journey_sdk::basic::journey::SoberJourney;
use sober_journey_sdk::{JourneySdkError, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Chain id the InputVerifier reports in its EIP-712 domain
pub const DOMAIN_CHAIN_ID: u64 = 55815;

pub fn contract_address() -> Address {
    Address::repeat_byte(0xc0)
}

pub fn input_verification_contract() -> Address {
    Address::repeat_byte(0x1e)
}

#[derive(Default)]
struct ChainState {
    block: u64,
    next_journey_id: u64,
    journeys: HashMap<u64, Journey>,
    participants: HashMap<(u64, Address), ParticipantRecord>,
    days: HashMap<(u64, Address), u64>,
    logs: Vec<ChainLog>,
    receipts: HashMap<B256, TxReceipt>,
}

/// In-process stand-in for a dev node running SoberJourneyFHE, the fhEVM
/// InputVerifier and the mock coprocessor.
pub struct FakeChain {
    pub chain_id: u64,
    pub contract: Address,
    pub input_verifier: Address,
    coprocessor: Arc<MockCoprocessor>,
    state: Mutex<ChainState>,
    send_failures: Mutex<VecDeque<String>>,
    call_delay: Duration,
    sends: AtomicUsize,
    domain_reads: AtomicUsize,
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            chain_id: LOCAL_CHAIN_ID,
            contract: contract_address(),
            input_verifier: LOCAL_INPUT_VERIFIER_ADDRESS,
            coprocessor: Arc::new(MockCoprocessor::new()),
            state: Mutex::new(ChainState {
                next_journey_id: 1,
                ..ChainState::default()
            }),
            send_failures: Mutex::new(VecDeque::new()),
            call_delay: Duration::ZERO,
            sends: AtomicUsize::new(0),
            domain_reads: AtomicUsize::new(0),
        }
    }

    /// Every `eth_call` suspends this long first
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn coprocessor(&self) -> &Arc<MockCoprocessor> {
        &self.coprocessor
    }

    /// The next `send_transaction` calls fail with these messages, in order
    pub fn fail_next_sends(&self, messages: &[&str]) {
        let mut failures = self.send_failures.lock().unwrap();
        failures.extend(messages.iter().map(|m| m.to_string()));
    }

    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn domain_reads(&self) -> usize {
        self.domain_reads.load(Ordering::SeqCst)
    }

    /// Add a raw log as if some other transaction emitted it
    pub fn inject_log(&self, log: ChainLog) {
        let mut state = self.state.lock().unwrap();
        if let Some(block) = log.block_number {
            state.block = state.block.max(block);
        }
        state.logs.push(log);
    }

    pub fn mock_config(&self) -> MockInstanceConfig {
        MockInstanceConfig {
            chain_id: self.chain_id,
            addresses: local_addresses(),
            gateway_chain_id: DOMAIN_CHAIN_ID,
            verifying_contract_decryption: LOCAL_DECRYPTION_VERIFYING_CONTRACT,
            verifying_contract_input_verification: input_verification_contract(),
        }
    }

    pub fn account(self: &Arc<Self>, sender: Address) -> Arc<FakeAccount> {
        Arc::new(FakeAccount {
            chain: self.clone(),
            sender,
        })
    }

    fn view(&self, to: Address, data: &[u8]) -> std::result::Result<Bytes, ConnectionError> {
        if to == self.input_verifier {
            if data.get(..4) != Some(&IEip712Domain::eip712DomainCall::SELECTOR[..]) {
                return Err("execution reverted".into());
            }
            self.domain_reads.fetch_add(1, Ordering::SeqCst);
            let ret = IEip712Domain::eip712DomainReturn {
                fields: FixedBytes([0x0f]),
                name: "InputVerification".to_string(),
                version: "1".to_string(),
                chainId: U256::from(DOMAIN_CHAIN_ID),
                verifyingContract: input_verification_contract(),
                salt: B256::ZERO,
                extensions: vec![],
            };
            return Ok(IEip712Domain::eip712DomainCall::abi_encode_returns(&ret).into());
        }
        if to != self.contract {
            return Err(format!("no contract at {}", to).into());
        }

        let state = self.state.lock().unwrap();
        let encoded = match ISoberJourneyFHECalls::abi_decode(data)? {
            ISoberJourneyFHECalls::nextJourneyId(_) => {
                ISoberJourneyFHE::nextJourneyIdCall::abi_encode_returns(&U256::from(
                    state.next_journey_id,
                ))
            },
            ISoberJourneyFHECalls::getJourneyInfo(call) => {
                let journey = state
                    .journeys
                    .get(&call.journeyId.saturating_to::<u64>())
                    .cloned()
                    .unwrap_or_else(empty_journey);
                ISoberJourneyFHE::getJourneyInfoCall::abi_encode_returns(&journey)
            },
            ISoberJourneyFHECalls::getParticipantInfo(call) => {
                let record = state
                    .participants
                    .get(&(call.journeyId.saturating_to::<u64>(), call.participant))
                    .cloned()
                    .unwrap_or_else(empty_participant);
                ISoberJourneyFHE::getParticipantInfoCall::abi_encode_returns(&record)
            },
            ISoberJourneyFHECalls::getEncryptedProgressDays(call) => {
                let handle = state
                    .participants
                    .get(&(call.journeyId.saturating_to::<u64>(), call.participant))
                    .map(|p| p.encryptedProgressDays)
                    .unwrap_or_default();
                ISoberJourneyFHE::getEncryptedProgressDaysCall::abi_encode_returns(&handle)
            },
            _ => return Err("execution reverted: not a view".into()),
        };
        Ok(encoded.into())
    }

    /// Execute a transaction and mine it in its own block
    fn execute(&self, from: Address, to: Address, data: &[u8], value: U256) -> std::result::Result<B256, ConnectionError> {
        if to != self.contract {
            return Err(format!("no contract at {}", to).into());
        }
        let call = ISoberJourneyFHECalls::abi_decode(data)?;

        let mut state = self.state.lock().unwrap();
        state.block += 1;
        let block = state.block;
        let mut preimage = block.to_be_bytes().to_vec();
        preimage.extend_from_slice(from.as_slice());
        preimage.extend_from_slice(data);
        let tx_hash = keccak256(preimage);

        // A revert still mines, with no logs and a failed status
        let (success, logs) = match self.apply(&mut state, from, call, value) {
            Ok(events) => (
                true,
                events
                    .into_iter()
                    .enumerate()
                    .map(|(i, (topics, data))| ChainLog {
                        address: self.contract,
                        topics,
                        data,
                        block_number: Some(block),
                        log_index: Some(i as u64),
                        transaction_hash: Some(tx_hash),
                    })
                    .collect::<Vec<_>>(),
            ),
            Err(_) => (false, Vec::new()),
        };
        state.logs.extend(logs.iter().cloned());
        state.receipts.insert(
            tx_hash,
            TxReceipt {
                tx_hash,
                block_number: block,
                success,
                logs,
            },
        );
        Ok(tx_hash)
    }

    fn apply(
        &self,
        state: &mut ChainState,
        from: Address,
        call: ISoberJourneyFHECalls,
        value: U256,
    ) -> std::result::Result<Vec<(Vec<B256>, Bytes)>, String> {
        match call {
            ISoberJourneyFHECalls::startJourney(call) => {
                let journey_id = state.next_journey_id;
                state.next_journey_id += 1;
                state.journeys.insert(
                    journey_id,
                    Journey {
                        journeyId: U256::from(journey_id),
                        creator: from,
                        journeyCID: call.journeyCID.clone(),
                        startTime: call.startTime,
                        endTime: call.endTime,
                        daysTotal: call.daysTotal,
                        stakeAmount: call.stakeAmount,
                        stakeToken: call.stakeToken,
                        requireEvidence: call.requireEvidence,
                        verificationMode: call.verificationMode,
                        rewardPool: value,
                        finalized: false,
                    },
                );
                Ok(vec![event(ISoberJourneyFHE::JourneyStarted {
                    journeyId: U256::from(journey_id),
                    creator: from,
                    journeyCID: call.journeyCID,
                })])
            },
            ISoberJourneyFHECalls::enrollInJourney(call) => {
                let journey_id: u64 = call.journeyId.saturating_to::<u64>();
                let journey = state.journeys.get(&journey_id).ok_or("journey not found")?;
                if journey.stakeToken == Address::ZERO && value != journey.stakeAmount {
                    return Err("wrong stake".into());
                }
                if state.participants.contains_key(&(journey_id, from)) {
                    return Err("already enrolled".into());
                }
                state.participants.insert(
                    (journey_id, from),
                    ParticipantRecord {
                        participant: from,
                        enrolledAt: U256::from(state.block),
                        status: 1,
                        stakeLocked: value,
                        encryptedProgressDays: B256::ZERO,
                    },
                );
                Ok(vec![event(ISoberJourneyFHE::ParticipantEnrolled {
                    journeyId: call.journeyId,
                    participant: from,
                })])
            },
            ISoberJourneyFHECalls::recordProgress(call) => {
                let journey_id: u64 = call.journeyId.saturating_to::<u64>();
                let current = state
                    .participants
                    .get(&(journey_id, from))
                    .map(|p| p.encryptedProgressDays)
                    .ok_or("not enrolled")?;

                let (handles, attestation) =
                    decode_input_proof(&call.inputProof).map_err(|e| e.to_string())?;
                if handles.first() != Some(&call.encIncrement) {
                    return Err("handle not in proof".into());
                }
                let expected = input_attestation(&self.mock_config(), &handles, from, self.contract);
                if attestation != expected {
                    return Err("invalid input proof".into());
                }

                let next = self
                    .coprocessor
                    .add_u32(&current, &call.encIncrement, self.chain_id)
                    .ok_or("unknown ciphertext")?;
                if let Some(record) = state.participants.get_mut(&(journey_id, from)) {
                    record.encryptedProgressDays = next;
                }
                let day = state.days.entry((journey_id, from)).or_insert(0);
                *day += 1;
                Ok(vec![event(ISoberJourneyFHE::ProgressRecorded {
                    journeyId: call.journeyId,
                    participant: from,
                    dayIndex: U256::from(*day),
                    reportCID: call.reportCID,
                })])
            },
            ISoberJourneyFHECalls::validateProgress(call) => Ok(vec![event(
                ISoberJourneyFHE::ProgressValidated {
                    journeyId: call.journeyId,
                    participant: call.participant,
                    dayIndex: call.dayIndex,
                    validator: from,
                    approve: call.approve,
                },
            )]),
            _ => Err("not a transaction".into()),
        }
    }
}

fn event<E: SolEvent>(event: E) -> (Vec<B256>, Bytes) {
    let data = event.encode_log_data();
    (data.topics().to_vec(), data.data.clone())
}

fn empty_journey() -> Journey {
    Journey {
        journeyId: U256::ZERO,
        creator: Address::ZERO,
        journeyCID: String::new(),
        startTime: U256::ZERO,
        endTime: U256::ZERO,
        daysTotal: U256::ZERO,
        stakeAmount: U256::ZERO,
        stakeToken: Address::ZERO,
        requireEvidence: false,
        verificationMode: 0,
        rewardPool: U256::ZERO,
        finalized: false,
    }
}

fn empty_participant() -> ParticipantRecord {
    ParticipantRecord {
        participant: Address::ZERO,
        enrolledAt: U256::ZERO,
        status: 0,
        stakeLocked: U256::ZERO,
        encryptedProgressDays: B256::ZERO,
    }
}

pub fn local_addresses() -> FhevmAddresses {
    FhevmAddresses {
        acl: LOCAL_ACL_ADDRESS,
        input_verifier: LOCAL_INPUT_VERIFIER_ADDRESS,
        kms_verifier: LOCAL_KMS_VERIFIER_ADDRESS,
    }
}

#[async_trait]
impl EvmConnection for FakeChain {
    async fn get_chain_id(&self) -> std::result::Result<u64, ConnectionError> {
        Ok(self.chain_id)
    }

    async fn call(&self, to: Address, data: Bytes) -> std::result::Result<Bytes, ConnectionError> {
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }
        self.view(to, &data)
    }

    async fn get_block_number(&self) -> std::result::Result<u64, ConnectionError> {
        Ok(self.state.lock().unwrap().block)
    }

    async fn get_logs(&self, filter: &LogFilter) -> std::result::Result<Vec<ChainLog>, ConnectionError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .logs
            .iter()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect())
    }
}

/// One externally owned account on a [`FakeChain`]
pub struct FakeAccount {
    chain: Arc<FakeChain>,
    sender: Address,
}

#[async_trait]
impl EvmConnection for FakeAccount {
    async fn get_chain_id(&self) -> std::result::Result<u64, ConnectionError> {
        self.chain.get_chain_id().await
    }

    async fn call(&self, to: Address, data: Bytes) -> std::result::Result<Bytes, ConnectionError> {
        self.chain.call(to, data).await
    }

    async fn get_block_number(&self) -> std::result::Result<u64, ConnectionError> {
        self.chain.get_block_number().await
    }

    async fn get_logs(&self, filter: &LogFilter) -> std::result::Result<Vec<ChainLog>, ConnectionError> {
        self.chain.get_logs(filter).await
    }
}

#[async_trait]
impl EvmWriteConnection for FakeAccount {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> std::result::Result<B256, ConnectionError> {
        self.chain.sends.fetch_add(1, Ordering::SeqCst);
        let injected = self.chain.send_failures.lock().unwrap().pop_front();
        if let Some(message) = injected {
            return Err(message.into());
        }
        self.chain.execute(self.sender, to, &data, value)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> std::result::Result<TxReceipt, ConnectionError> {
        let state = self.chain.state.lock().unwrap();
        state
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| format!("unknown transaction {}", tx_hash).into())
    }
}

/// Hands out the fake chain for its RPC URL
pub struct FakeConnector {
    chain: Arc<FakeChain>,
    connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(chain: Arc<FakeChain>) -> Self {
        Self {
            chain,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl RpcConnector for FakeConnector {
    fn connect(&self, rpc_url: &str) -> std::result::Result<Arc<dyn EvmConnection>, ConnectionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if rpc_url != LOCAL_RPC_URL {
            return Err(format!("connection refused: {}", rpc_url).into());
        }
        Ok(self.chain.clone())
    }
}

//=============================================================================
// Relayer SDK doubles
//=============================================================================

/// Serves network instances backed by the mock coprocessor
pub struct FakeRelayerSdk {
    coprocessor: Arc<MockCoprocessor>,
    inits: AtomicUsize,
}

#[async_trait]
impl RelayerSdk for FakeRelayerSdk {
    async fn init(&self) -> Result<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_instance(&self, config: &NetworkInstanceConfig) -> Result<Arc<dyn FheInstance>> {
        let instance = MockFheInstance::new(
            MockInstanceConfig {
                chain_id: config.chain_id,
                addresses: config.addresses,
                gateway_chain_id: config.gateway_chain_id,
                verifying_contract_decryption: config.verifying_contract_decryption,
                verifying_contract_input_verification: config.verifying_contract_input_verification,
            },
            self.coprocessor.clone(),
        );
        Ok(Arc::new(instance))
    }
}

/// Module loader with per-source failures, a fetch counter and latency
pub struct FakeModuleLoader {
    broken: HashSet<String>,
    delay: Duration,
    coprocessor: Arc<MockCoprocessor>,
    fetches: Mutex<Vec<String>>,
}

impl FakeModuleLoader {
    pub fn new(coprocessor: Arc<MockCoprocessor>) -> Self {
        Self {
            broken: HashSet::new(),
            delay: Duration::ZERO,
            coprocessor,
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_broken(mut self, source: &str) -> Self {
        self.broken.insert(source.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl SdkModuleLoader for FakeModuleLoader {
    async fn load_module(&self, source: &str) -> std::result::Result<Arc<dyn RelayerSdk>, String> {
        self.fetches.lock().unwrap().push(source.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.broken.contains(source) {
            return Err(format!("Failed to load {}", source));
        }
        Ok(Arc::new(FakeRelayerSdk {
            coprocessor: self.coprocessor.clone(),
            inits: AtomicUsize::new(0),
        }))
    }
}

/// FHEVM config pointing the local chain at the fake node
pub fn fhevm_config() -> FhevmConfig {
    FhevmConfig {
        mock_chains: vec![MockChainConfig::default()],
        network: NetworkInstanceConfig::default(),
        sdk_sources: vec![SDK_LOCAL_URL.to_string(), SDK_CDN_URL.to_string()],
    }
}

pub struct TestContext {
    pub chain: Arc<FakeChain>,
    pub connector: Arc<FakeConnector>,
    pub modules: Arc<FakeModuleLoader>,
    pub loader: Arc<InstanceLoader>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_chain(FakeChain::new())
    }

    pub fn with_chain(chain: FakeChain) -> Self {
        let chain = chain.shared();
        let connector = Arc::new(FakeConnector::new(chain.clone()));
        let modules = Arc::new(FakeModuleLoader::new(chain.coprocessor().clone()));
        Self::assemble(chain, connector, modules)
    }

    pub fn with_modules(modules: FakeModuleLoader) -> Self {
        let chain = FakeChain::new().shared();
        let connector = Arc::new(FakeConnector::new(chain.clone()));
        Self::assemble(chain, connector, Arc::new(modules))
    }

    fn assemble(
        chain: Arc<FakeChain>,
        connector: Arc<FakeConnector>,
        modules: Arc<FakeModuleLoader>,
    ) -> Self {
        let loader = InstanceLoader::new(fhevm_config(), modules.clone(), connector.clone())
            .with_mock_coprocessor(chain.coprocessor().clone());
        Self {
            chain,
            connector,
            modules,
            loader: Arc::new(loader),
        }
    }
}

//=============================================================================
// Signers
//=============================================================================

/// Local key that counts signatures and can decline or stall
pub struct TestSigner {
    key: PrivateKeySigner,
    reject: bool,
    delay: Duration,
    signatures: AtomicUsize,
}

impl TestSigner {
    pub fn random() -> Self {
        Self {
            key: PrivateKeySigner::random(),
            reject: false,
            delay: Duration::ZERO,
            signatures: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn signatures(&self) -> usize {
        self.signatures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JourneySigner for TestSigner {
    fn address(&self) -> Address {
        self.key.address()
    }

    async fn sign_typed_data(&self, typed_data: &DecryptionTypedData) -> std::result::Result<Bytes, String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.reject {
            return Err("User rejected the request".to_string());
        }
        self.signatures.fetch_add(1, Ordering::SeqCst);
        JourneySigner::sign_typed_data(&self.key, typed_data).await
    }
}

/// Journey window covering the present
pub fn active_window() -> (u64, u64) {
    let now = sober_journey_sdk::utils::now_secs();
    (now - 60, now + 30 * SECONDS_PER_DAY)
}

//=============================================================================
// Scenario helpers
//=============================================================================

pub fn journey_contract(chain: &FakeChain) -> SoberJourney {
    SoberJourney::new(chain.contract, chain.chain_id)
}

/// Create an active journey as `account` and enroll it
pub async fn start_and_enroll(chain: &FakeChain, account: &FakeAccount) -> u64 {
    let journey = journey_contract(chain);
    let (start, end) = active_window();
    let started = journey
        .start_journey()
        .with_cid("ipfs://rules")
        .with_window(start, end)
        .with_days_total(30)
        .send(account)
        .await
        .unwrap();
    journey
        .enroll_in_journey(account, started.journey_id, U256::ZERO)
        .await
        .unwrap();
    started.journey_id
}

/// A `ProgressRecorded` log as the node would return it
pub fn progress_log(
    chain: &FakeChain,
    journey_id: u64,
    participant: Address,
    block: Option<u64>,
    log_index: u64,
) -> ChainLog {
    let data = ISoberJourneyFHE::ProgressRecorded {
        journeyId: U256::from(journey_id),
        participant,
        dayIndex: U256::from(block.unwrap_or_default()),
        reportCID: format!("ipfs://day-{}", block.unwrap_or_default()),
    }
    .encode_log_data();
    ChainLog {
        address: chain.contract,
        topics: data.topics().to_vec(),
        data: data.data.clone(),
        block_number: block,
        log_index: Some(log_index),
        transaction_hash: Some(B256::with_last_byte(log_index as u8)),
    }
}
