//! Signed, time-boxed decryption capabilities and their persistent cache.
//!
//! A capability lets one user reencrypt handles held under a fixed set of
//! contracts for `durationDays` from `startTimestamp`. Signing one may need
//! human approval, so a still-valid capability is reused rather than minted
//! again.

use crate::core::constants::{
    DECRYPTION_SIGNATURE_KEY_PREFIX, DEFAULT_DECRYPTION_DURATION_DAYS, SECONDS_PER_DAY,
};
use crate::core::signer::JourneySigner;
use crate::core::store::StringStore;
use crate::error::{JourneySdkError, Result};
use crate::fhevm::instance::FheInstance;
use crate::utils::now_secs;
use alloy_primitives::Address;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// "user U may decrypt handles under contracts C from T for N days"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptionCapability {
    pub private_key: String,
    pub public_key: String,

    /// 0x-prefixed 65-byte signature over the EIP-712 request
    pub signature: String,

    /// Sorted and de-duplicated
    pub contract_addresses: Vec<Address>,

    pub user_address: Address,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

impl DecryptionCapability {
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        now >= self.start_timestamp && now < self.expires_at()
    }

    /// Whether every contract in `contracts` is authorized
    pub fn covers(&self, contracts: &[Address]) -> bool {
        contracts
            .iter()
            .all(|c| self.contract_addresses.binary_search(c).is_ok())
    }
}

/// Sorted, de-duplicated contract set
pub fn normalize_contracts(contracts: &[Address]) -> Vec<Address> {
    let mut sorted = contracts.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
}

/// Storage key for a (chain, user, contract set) triple
pub fn capability_key(chain_id: u64, user: &Address, contracts: &[Address]) -> String {
    let contracts = normalize_contracts(contracts)
        .iter()
        .map(|c| hex::encode(c.as_slice()))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{}:{}:{}:{}",
        DECRYPTION_SIGNATURE_KEY_PREFIX,
        chain_id,
        hex::encode(user.as_slice()),
        contracts
    )
}

/// Produces and caches decryption capabilities.
///
/// At most one capability is persisted per key; concurrent callers for the
/// same key wait on the same signing request.
pub struct DecryptionSignatureCache {
    store: Arc<dyn StringStore>,
    duration_days: u64,
    signing: DashMap<String, Arc<Mutex<()>>>,
    signatures_requested: AtomicUsize,
}

impl DecryptionSignatureCache {
    pub fn new(store: Arc<dyn StringStore>) -> Self {
        Self {
            store,
            duration_days: DEFAULT_DECRYPTION_DURATION_DAYS,
            signing: DashMap::new(),
            signatures_requested: AtomicUsize::new(0),
        }
    }

    pub fn with_duration_days(mut self, days: u64) -> Self {
        self.duration_days = days.max(1);
        self
    }

    pub fn duration_days(&self) -> u64 {
        self.duration_days
    }

    /// Number of signatures requested from signers so far
    pub fn signatures_requested(&self) -> usize {
        self.signatures_requested.load(Ordering::SeqCst)
    }

    /// Return a valid capability for `contracts`, signing a new one if needed.
    ///
    /// `None` means decryption is not currently possible: the signer declined
    /// or is unavailable, or no contracts were given.
    pub async fn load_or_sign(
        &self,
        instance: &dyn FheInstance,
        contracts: &[Address],
        signer: &dyn JourneySigner,
    ) -> Option<DecryptionCapability> {
        let contracts = normalize_contracts(contracts);
        if contracts.is_empty() {
            warn!("Decryption requested without any contract address");
            return None;
        }

        let user = signer.address();
        let key = capability_key(instance.chain_id(), &user, &contracts);

        let lock = self.signing.entry(key.clone()).or_default().clone();
        let _guard = lock.lock().await;

        let now = now_secs();
        if let Some(existing) = self.load(&key).await {
            if existing.is_valid_at(now)
                && existing.user_address == user
                && existing.contract_addresses == contracts
            {
                debug!(%user, expires_at = existing.expires_at(), "Reusing decryption signature");
                return Some(existing);
            }
            debug!(%user, "Stored decryption signature is stale");
        }

        match self.sign(instance, &contracts, signer, now).await {
            Ok(capability) => {
                match serde_json::to_string(&capability) {
                    Ok(json) => {
                        if let Err(e) = self.store.set(&key, json).await {
                            warn!(%user, "Failed to persist decryption signature: {}", e);
                        }
                    },
                    Err(e) => warn!(%user, "Failed to serialize decryption signature: {}", e),
                }
                info!(
                    %user,
                    chain_id = instance.chain_id(),
                    contracts = contracts.len(),
                    "Signed new decryption capability"
                );
                Some(capability)
            },
            Err(e) => {
                warn!(%user, "Unable to build decryption signature: {}", e);
                None
            },
        }
    }

    /// Drop the persisted capability for an identity that is no longer current
    pub async fn invalidate(
        &self,
        chain_id: u64,
        user: &Address,
        contracts: &[Address],
    ) -> Result<()> {
        let key = capability_key(chain_id, user, contracts);
        self.store.remove(&key).await
    }

    async fn load(&self, key: &str) -> Option<DecryptionCapability> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read decryption signature store: {}", e);
                return None;
            },
        };
        match serde_json::from_str(&raw) {
            Ok(capability) => Some(capability),
            Err(e) => {
                warn!("Discarding unreadable decryption signature: {}", e);
                None
            },
        }
    }

    async fn sign(
        &self,
        instance: &dyn FheInstance,
        contracts: &[Address],
        signer: &dyn JourneySigner,
        now: u64,
    ) -> Result<DecryptionCapability> {
        let keypair = instance.generate_keypair();
        let typed_data =
            instance.create_eip712(&keypair.public_key, contracts, now, self.duration_days)?;

        self.signatures_requested.fetch_add(1, Ordering::SeqCst);
        let signature = signer
            .sign_typed_data(&typed_data)
            .await
            .map_err(JourneySdkError::SigningRejected)?;

        Ok(DecryptionCapability {
            private_key: keypair.private_key,
            public_key: keypair.public_key,
            signature: format!("0x{}", hex::encode(&signature)),
            contract_addresses: contracts.to_vec(),
            user_address: signer.address(),
            start_timestamp: now,
            duration_days: self.duration_days,
        })
    }
}
