use crate::error::{JourneySdkError, Result};
use crate::fhevm::decryption::DecryptionCapability;
use alloy::sol_types::{Eip712Domain, SolStruct};
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sober_journey_interface::UserDecryptRequestVerification;
use std::borrow::Cow;
use std::collections::HashMap;

/// Upper bound on the plaintext bits packed into one encrypted input
pub const MAX_INPUT_BITS: u32 = 2048;

/// Upper bound on the values in one encrypted input; the proof carries the
/// count in a single byte
pub const MAX_INPUT_VALUES: usize = u8::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceMode {
    /// Backed by the remote relayer
    Network,
    /// Simulated coprocessor on a local development chain
    Mock,
}

/// fhEVM host contracts an instance is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhevmAddresses {
    pub acl: Address,
    pub input_verifier: Address,
    pub kms_verifier: Address,
}

/// Encrypted scalar types, with the type codes the coprocessor embeds in handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FheType {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uint128,
    Address,
    Uint256,
}

impl FheType {
    pub fn code(&self) -> u8 {
        match self {
            FheType::Bool => 0,
            FheType::Uint8 => 2,
            FheType::Uint16 => 3,
            FheType::Uint32 => 4,
            FheType::Uint64 => 5,
            FheType::Uint128 => 6,
            FheType::Address => 7,
            FheType::Uint256 => 8,
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            FheType::Bool => 1,
            FheType::Uint8 => 8,
            FheType::Uint16 => 16,
            FheType::Uint32 => 32,
            FheType::Uint64 => 64,
            FheType::Uint128 => 128,
            FheType::Address => 160,
            FheType::Uint256 => 256,
        }
    }

    /// Whether `value` is representable in this type
    pub fn fits(&self, value: &U256) -> bool {
        self.bits() >= 256 || value.bit_len() <= self.bits() as usize
    }
}

/// Plaintext values waiting to be encrypted.
///
/// The resulting ciphertext is bound to exactly one contract and one user;
/// it cannot be replayed against another contract or by another account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInputRequest {
    contract: Address,
    user: Address,
    values: Vec<(FheType, U256)>,
}

impl EncryptedInputRequest {
    pub fn new(contract: Address, user: Address) -> Self {
        Self {
            contract,
            user,
            values: Vec::new(),
        }
    }

    pub fn add_bool(mut self, value: bool) -> Self {
        self.values.push((FheType::Bool, U256::from(value as u8)));
        self
    }

    pub fn add8(mut self, value: u8) -> Self {
        self.values.push((FheType::Uint8, U256::from(value)));
        self
    }

    pub fn add16(mut self, value: u16) -> Self {
        self.values.push((FheType::Uint16, U256::from(value)));
        self
    }

    pub fn add32(mut self, value: u32) -> Self {
        self.values.push((FheType::Uint32, U256::from(value)));
        self
    }

    pub fn add64(mut self, value: u64) -> Self {
        self.values.push((FheType::Uint64, U256::from(value)));
        self
    }

    pub fn add_address(mut self, value: Address) -> Self {
        self.values
            .push((FheType::Address, U256::from_be_slice(value.as_slice())));
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn user(&self) -> Address {
        self.user
    }

    pub fn values(&self) -> &[(FheType, U256)] {
        &self.values
    }

    pub fn total_bits(&self) -> u32 {
        self.values.iter().map(|(ty, _)| ty.bits()).sum()
    }

    /// Checks the request before any ciphertext is produced
    pub fn validate(&self) -> Result<()> {
        if self.values.is_empty() {
            return Err(JourneySdkError::InvalidInput(
                "Encrypted input has no values".to_string(),
            ));
        }
        if self.values.len() > MAX_INPUT_VALUES {
            return Err(JourneySdkError::InvalidInput(format!(
                "Encrypted input has {} values, limit is {}",
                self.values.len(),
                MAX_INPUT_VALUES
            )));
        }
        if self.total_bits() > MAX_INPUT_BITS {
            return Err(JourneySdkError::InvalidInput(format!(
                "Encrypted input uses {} bits, limit is {}",
                self.total_bits(),
                MAX_INPUT_BITS
            )));
        }
        Ok(())
    }
}

/// Ciphertext handles plus the zero-knowledge proof the contract verifies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInput {
    pub handles: Vec<B256>,
    pub input_proof: Bytes,
}

/// Ephemeral reencryption key pair, hex encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FheKeypair {
    pub public_key: String,
    pub private_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleContractPair {
    pub handle: B256,
    pub contract: Address,
}

/// EIP-712 payload a user signs to authorize reencryption
#[derive(Debug, Clone)]
pub struct DecryptionTypedData {
    pub domain: Eip712Domain,
    pub message: UserDecryptRequestVerification,
}

impl DecryptionTypedData {
    pub fn new(
        domain_chain_id: u64,
        verifying_contract: Address,
        contracts_chain_id: u64,
        public_key: &str,
        contracts: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Result<Self> {
        let public_key = hex::decode(public_key.trim_start_matches("0x")).map_err(|e| {
            JourneySdkError::InvalidInput(format!("Public key is not hex: {}", e))
        })?;

        let domain = Eip712Domain::new(
            Some(Cow::Borrowed("Decryption")),
            Some(Cow::Borrowed("1")),
            Some(U256::from(domain_chain_id)),
            Some(verifying_contract),
            None,
        );

        let message = UserDecryptRequestVerification {
            publicKey: Bytes::from(public_key),
            contractAddresses: contracts.to_vec(),
            contractsChainId: U256::from(contracts_chain_id),
            startTimestamp: U256::from(start_timestamp),
            durationDays: U256::from(duration_days),
        };

        Ok(Self { domain, message })
    }

    /// Digest the signer commits to
    pub fn signing_hash(&self) -> B256 {
        self.message.eip712_signing_hash(&self.domain)
    }

    /// `eth_signTypedData_v4` request body for external wallets
    pub fn to_json(&self) -> serde_json::Value {
        let contracts: Vec<String> = self
            .message
            .contractAddresses
            .iter()
            .map(|a| a.to_checksum(None))
            .collect();

        json!({
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "version", "type": "string" },
                    { "name": "chainId", "type": "uint256" },
                    { "name": "verifyingContract", "type": "address" }
                ],
                "UserDecryptRequestVerification": [
                    { "name": "publicKey", "type": "bytes" },
                    { "name": "contractAddresses", "type": "address[]" },
                    { "name": "contractsChainId", "type": "uint256" },
                    { "name": "startTimestamp", "type": "uint256" },
                    { "name": "durationDays", "type": "uint256" }
                ]
            },
            "primaryType": "UserDecryptRequestVerification",
            "domain": {
                "name": self.domain.name.as_deref().unwrap_or_default(),
                "version": self.domain.version.as_deref().unwrap_or_default(),
                "chainId": self.domain.chain_id.unwrap_or_default().to_string(),
                "verifyingContract": self
                    .domain
                    .verifying_contract
                    .unwrap_or_default()
                    .to_checksum(None),
            },
            "message": {
                "publicKey": self.message.publicKey.to_string(),
                "contractAddresses": contracts,
                "contractsChainId": self.message.contractsChainId.to_string(),
                "startTimestamp": self.message.startTimestamp.to_string(),
                "durationDays": self.message.durationDays.to_string(),
            }
        })
    }
}

/// A live FHE computation context bound to one chain.
///
/// Network instances come from the relayer SDK; mock instances simulate the
/// coprocessor against a local development chain.
#[async_trait]
pub trait FheInstance: Send + Sync {
    fn chain_id(&self) -> u64;

    fn mode(&self) -> InstanceMode;

    fn addresses(&self) -> FhevmAddresses;

    /// Produce ciphertext handles and an input proof for `input`.
    async fn encrypt(&self, input: &EncryptedInputRequest) -> Result<EncryptedInput>;

    fn generate_keypair(&self) -> FheKeypair;

    /// Build the typed data a user signs to decrypt under `contracts`.
    fn create_eip712(
        &self,
        public_key: &str,
        contracts: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Result<DecryptionTypedData>;

    /// Reencrypt and reveal `pairs` under a signed capability.
    async fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        capability: &DecryptionCapability,
    ) -> Result<HashMap<B256, U256>>;
}
