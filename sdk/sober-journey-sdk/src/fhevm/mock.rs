//! Local-chain stand-in for the FHE coprocessor.
//!
//! Ciphertexts are never produced. Each handle is a deterministic id whose
//! cleartext is kept in a shared [`MockCoprocessor`], the same way the
//! hardhat fhEVM plugin tracks plaintexts next to a dev node.

use crate::error::{JourneySdkError, Result};
use crate::fhevm::decryption::DecryptionCapability;
use crate::fhevm::instance::{
    DecryptionTypedData, EncryptedInput, EncryptedInputRequest, FheInstance, FheKeypair,
    FheType, FhevmAddresses, HandleContractPair, InstanceMode,
};
use crate::utils::now_secs;
use alloy::sol_types::{Eip712Domain, SolStruct};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use rand::RngCore;
use sober_journey_interface::CiphertextVerification;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Handle format version written into the last byte
const HANDLE_VERSION: u8 = 0;

/// Plaintext bookkeeping shared by mock instances and a simulated chain.
#[derive(Debug, Default)]
pub struct MockCoprocessor {
    cleartexts: DashMap<B256, U256>,
    nonce: AtomicU64,
}

impl MockCoprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: B256, value: U256) {
        self.cleartexts.insert(handle, value);
    }

    pub fn cleartext(&self, handle: &B256) -> Option<U256> {
        self.cleartexts.get(handle).map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.cleartexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cleartexts.is_empty()
    }

    /// Fresh seed for a batch of input handles
    pub fn next_seed(&self, contract: &Address, user: &Address) -> B256 {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let mut preimage = Vec::with_capacity(48);
        preimage.extend_from_slice(contract.as_slice());
        preimage.extend_from_slice(user.as_slice());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        keccak256(preimage)
    }

    /// Handle layout: `[0..21]` seed prefix, `[21]` index, `[22..30]` chain
    /// id (big endian), `[30]` type code, `[31]` version.
    pub fn derive_handle(seed: &B256, index: u8, chain_id: u64, ty: FheType) -> B256 {
        let mut handle = [0u8; 32];
        handle[..21].copy_from_slice(&seed[..21]);
        handle[21] = index;
        handle[22..30].copy_from_slice(&chain_id.to_be_bytes());
        handle[30] = ty.code();
        handle[31] = HANDLE_VERSION;
        B256::from(handle)
    }

    /// Chain id embedded in a handle
    pub fn handle_chain_id(handle: &B256) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&handle[22..30]);
        u64::from_be_bytes(bytes)
    }

    /// Homomorphic `lhs + rhs` over euint32, as the host contract would run it.
    ///
    /// A zero `lhs` is an uninitialized counter and reads as 0. Returns `None`
    /// when `rhs` is unknown.
    pub fn add_u32(&self, lhs: &B256, rhs: &B256, chain_id: u64) -> Option<B256> {
        let left = if lhs.is_zero() {
            U256::ZERO
        } else {
            self.cleartext(lhs)?
        };
        let right = self.cleartext(rhs)?;
        let sum = left.wrapping_add(right) & U256::from(u32::MAX);

        let mut preimage = Vec::with_capacity(64);
        preimage.extend_from_slice(lhs.as_slice());
        preimage.extend_from_slice(rhs.as_slice());
        let seed = keccak256(preimage);
        let handle = Self::derive_handle(&seed, u8::MAX, chain_id, FheType::Uint32);
        self.register(handle, sum);
        Some(handle)
    }
}

/// Everything a mock instance needs to mirror the network instance's surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockInstanceConfig {
    pub chain_id: u64,
    pub addresses: FhevmAddresses,

    /// Chain id reported by the InputVerifier's EIP-712 domain
    pub gateway_chain_id: u64,

    pub verifying_contract_decryption: Address,

    /// Verifying contract reported by the InputVerifier's EIP-712 domain
    pub verifying_contract_input_verification: Address,
}

impl MockInstanceConfig {
    pub fn input_verification_domain(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Borrowed("InputVerification")),
            Some(Cow::Borrowed("1")),
            Some(U256::from(self.gateway_chain_id)),
            Some(self.verifying_contract_input_verification),
            None,
        )
    }
}

/// Input proof layout: `[n, 1] ++ n * handle ++ attestation digest`
pub fn encode_input_proof(handles: &[B256], attestation: &B256) -> Result<Bytes> {
    let count = u8::try_from(handles.len()).map_err(|_| {
        JourneySdkError::InvalidInput(format!("Too many handles for one proof: {}", handles.len()))
    })?;
    let mut proof = Vec::with_capacity(2 + handles.len() * 32 + 32);
    proof.push(count);
    proof.push(1);
    for handle in handles {
        proof.extend_from_slice(handle.as_slice());
    }
    proof.extend_from_slice(attestation.as_slice());
    Ok(Bytes::from(proof))
}

/// Inverse of [`encode_input_proof`]
pub fn decode_input_proof(proof: &[u8]) -> Result<(Vec<B256>, B256)> {
    let malformed = || JourneySdkError::Decode("Malformed input proof".to_string());
    let (&count, rest) = proof.split_first().ok_or_else(malformed)?;
    let (&signers, rest) = rest.split_first().ok_or_else(malformed)?;
    let count = count as usize;
    if signers != 1 || rest.len() != count * 32 + 32 {
        return Err(malformed());
    }
    let handles = rest[..count * 32]
        .chunks_exact(32)
        .map(B256::from_slice)
        .collect();
    let attestation = B256::from_slice(&rest[count * 32..]);
    Ok((handles, attestation))
}

/// Digest the mock InputVerifier attests to for a batch of handles
pub fn input_attestation(
    config: &MockInstanceConfig,
    handles: &[B256],
    user: Address,
    contract: Address,
) -> B256 {
    let message = CiphertextVerification {
        ctHandles: handles.to_vec(),
        userAddress: user,
        contractAddress: contract,
        contractChainId: U256::from(config.chain_id),
    };
    message.eip712_signing_hash(&config.input_verification_domain())
}

/// [`FheInstance`] served by a [`MockCoprocessor`]
#[derive(Debug, Clone)]
pub struct MockFheInstance {
    config: MockInstanceConfig,
    coprocessor: Arc<MockCoprocessor>,
}

impl MockFheInstance {
    pub fn new(config: MockInstanceConfig, coprocessor: Arc<MockCoprocessor>) -> Self {
        Self {
            config,
            coprocessor,
        }
    }

    pub fn config(&self) -> &MockInstanceConfig {
        &self.config
    }

    pub fn coprocessor(&self) -> &Arc<MockCoprocessor> {
        &self.coprocessor
    }
}

#[async_trait]
impl FheInstance for MockFheInstance {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    fn mode(&self) -> InstanceMode {
        InstanceMode::Mock
    }

    fn addresses(&self) -> FhevmAddresses {
        self.config.addresses
    }

    async fn encrypt(&self, input: &EncryptedInputRequest) -> Result<EncryptedInput> {
        input.validate()?;
        for (ty, value) in input.values() {
            if !ty.fits(value) {
                return Err(JourneySdkError::InvalidInput(format!(
                    "Value {} does not fit {:?}",
                    value, ty
                )));
            }
        }

        let seed = self.coprocessor.next_seed(&input.contract(), &input.user());
        let handles: Vec<B256> = input
            .values()
            .iter()
            .enumerate()
            .map(|(i, (ty, value))| {
                let index = u8::try_from(i).map_err(|_| {
                    JourneySdkError::InvalidInput(format!("Input index {} out of range", i))
                })?;
                let handle = MockCoprocessor::derive_handle(&seed, index, self.config.chain_id, *ty);
                self.coprocessor.register(handle, *value);
                Ok(handle)
            })
            .collect::<Result<_>>()?;

        let attestation = input_attestation(&self.config, &handles, input.user(), input.contract());
        debug!(
            handles = handles.len(),
            contract = %input.contract(),
            "Mock-encrypted input"
        );

        Ok(EncryptedInput {
            input_proof: encode_input_proof(&handles, &attestation)?,
            handles,
        })
    }

    fn generate_keypair(&self) -> FheKeypair {
        let mut private_key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut private_key);
        let public_key = keccak256(private_key);
        FheKeypair {
            public_key: hex::encode(public_key),
            private_key: hex::encode(private_key),
        }
    }

    fn create_eip712(
        &self,
        public_key: &str,
        contracts: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Result<DecryptionTypedData> {
        DecryptionTypedData::new(
            self.config.gateway_chain_id,
            self.config.verifying_contract_decryption,
            self.config.chain_id,
            public_key,
            contracts,
            start_timestamp,
            duration_days,
        )
    }

    async fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        capability: &DecryptionCapability,
    ) -> Result<HashMap<B256, U256>> {
        if !capability.is_valid_at(now_secs()) {
            return Err(JourneySdkError::Decryption(
                "Decryption signature is expired or not yet valid".to_string(),
            ));
        }
        if capability.signature.trim_start_matches("0x").is_empty() {
            return Err(JourneySdkError::Decryption(
                "Decryption signature is empty".to_string(),
            ));
        }

        let mut clear = HashMap::with_capacity(pairs.len());
        for pair in pairs {
            if !capability.covers(&[pair.contract]) {
                return Err(JourneySdkError::Decryption(format!(
                    "Contract {} is not authorized by the signature",
                    pair.contract
                )));
            }
            if pair.handle.is_zero() {
                return Err(JourneySdkError::Decryption(
                    "Handle is not initialized".to_string(),
                ));
            }
            let value = self.coprocessor.cleartext(&pair.handle).ok_or_else(|| {
                JourneySdkError::Decryption(format!("Unknown handle {}", pair.handle))
            })?;
            clear.insert(pair.handle, value);
        }
        Ok(clear)
    }
}
