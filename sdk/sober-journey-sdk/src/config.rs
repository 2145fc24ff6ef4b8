use crate::core::constants::*;
use crate::error::{JourneySdkError, Result};
use crate::fhevm::instance::FhevmAddresses;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;

/// Parameters the relayer SDK needs to create a network instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInstanceConfig {
    pub chain_id: u64,
    pub relayer_url: String,
    pub gateway_chain_id: u64,
    pub addresses: FhevmAddresses,
    pub verifying_contract_decryption: Address,
    pub verifying_contract_input_verification: Address,

    /// Host chain RPC the relayer SDK reads public keys through
    pub network_rpc_url: Option<String>,
}

impl Default for NetworkInstanceConfig {
    fn default() -> Self {
        Self {
            chain_id: SEPOLIA_CHAIN_ID,
            relayer_url: SEPOLIA_RELAYER_URL.to_string(),
            gateway_chain_id: SEPOLIA_GATEWAY_CHAIN_ID,
            addresses: FhevmAddresses {
                acl: SEPOLIA_ACL_ADDRESS,
                input_verifier: SEPOLIA_INPUT_VERIFIER_ADDRESS,
                kms_verifier: SEPOLIA_KMS_VERIFIER_ADDRESS,
            },
            verifying_contract_decryption: SEPOLIA_DECRYPTION_VERIFYING_CONTRACT,
            verifying_contract_input_verification: SEPOLIA_INPUT_VERIFICATION_VERIFYING_CONTRACT,
            network_rpc_url: None,
        }
    }
}

/// A development chain served by the mock coprocessor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockChainConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub addresses: FhevmAddresses,
    pub verifying_contract_decryption: Address,
}

impl Default for MockChainConfig {
    fn default() -> Self {
        Self {
            chain_id: LOCAL_CHAIN_ID,
            rpc_url: LOCAL_RPC_URL.to_string(),
            addresses: FhevmAddresses {
                acl: LOCAL_ACL_ADDRESS,
                input_verifier: LOCAL_INPUT_VERIFIER_ADDRESS,
                kms_verifier: LOCAL_KMS_VERIFIER_ADDRESS,
            },
            verifying_contract_decryption: LOCAL_DECRYPTION_VERIFYING_CONTRACT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhevmConfig {
    /// Chains that use the mock coprocessor; every other chain uses the relayer
    pub mock_chains: Vec<MockChainConfig>,
    pub network: NetworkInstanceConfig,

    /// Relayer SDK bundle locations, tried in order
    pub sdk_sources: Vec<String>,
}

impl Default for FhevmConfig {
    fn default() -> Self {
        Self {
            mock_chains: vec![MockChainConfig::default()],
            network: NetworkInstanceConfig::default(),
            sdk_sources: vec![SDK_LOCAL_URL.to_string(), SDK_CDN_URL.to_string()],
        }
    }
}

impl FhevmConfig {
    pub fn mock_chain(&self, chain_id: u64) -> Option<&MockChainConfig> {
        self.mock_chains.iter().find(|c| c.chain_id == chain_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyConfig {
    /// SoberJourneyFHE deployment per chain id
    pub contracts: BTreeMap<u64, Address>,
    pub fhevm: FhevmConfig,
    pub decryption_duration_days: u64,
}

impl Default for JourneyConfig {
    fn default() -> Self {
        Self {
            contracts: BTreeMap::new(),
            fhevm: FhevmConfig::default(),
            decryption_duration_days: DEFAULT_DECRYPTION_DURATION_DAYS,
        }
    }
}

impl JourneyConfig {
    /// Build from the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        if Path::new(".env").exists() {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = JourneyConfig::default();

        if let Some(raw) = lookup("SOBER_JOURNEY_LOCAL_ADDRESS") {
            let address = raw.trim().parse::<Address>().map_err(|e| {
                JourneySdkError::Config(format!("SOBER_JOURNEY_LOCAL_ADDRESS: {}", e))
            })?;
            config.contracts.insert(LOCAL_CHAIN_ID, address);
        }

        // Sepolia always resolves; a missing or malformed value leaves the zero address
        let sepolia = lookup("SOBER_JOURNEY_SEPOLIA_ADDRESS")
            .filter(|raw| raw.trim().starts_with("0x"))
            .and_then(|raw| raw.trim().parse::<Address>().ok())
            .unwrap_or(Address::ZERO);
        config.contracts.insert(SEPOLIA_CHAIN_ID, sepolia);

        if let Some(rpc_url) = lookup("FHEVM_LOCAL_RPC_URL") {
            for chain in config.fhevm.mock_chains.iter_mut() {
                chain.rpc_url = rpc_url.clone();
            }
        }
        if let Some(primary) = lookup("FHEVM_SDK_PRIMARY_URL") {
            config.fhevm.sdk_sources[0] = primary;
        }
        if let Some(fallback) = lookup("FHEVM_SDK_FALLBACK_URL") {
            config.fhevm.sdk_sources[1] = fallback;
        }
        if let Some(days) = lookup("FHEVM_DECRYPTION_DURATION_DAYS") {
            config.decryption_duration_days = days.trim().parse().map_err(|e| {
                JourneySdkError::Config(format!("FHEVM_DECRYPTION_DURATION_DAYS: {}", e))
            })?;
        }

        Ok(config)
    }

    pub fn with_contract(mut self, chain_id: u64, address: Address) -> Self {
        self.contracts.insert(chain_id, address);
        self
    }

    pub fn with_fhevm(mut self, fhevm: FhevmConfig) -> Self {
        self.fhevm = fhevm;
        self
    }

    /// Deployed contract for `chain_id`.
    ///
    /// The zero address is returned as-is when configured, since that is how
    /// an undeployed Sepolia contract is represented.
    pub fn contract_address(&self, chain_id: u64) -> Result<Address> {
        self.contracts
            .get(&chain_id)
            .copied()
            .ok_or(JourneySdkError::ContractNotConfigured(chain_id))
    }
}
