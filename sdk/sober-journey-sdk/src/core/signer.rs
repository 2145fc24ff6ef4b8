use crate::fhevm::instance::DecryptionTypedData;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;

/// Abstraction for the user's authenticated identity.
/// This allows the SDK to work with:
/// 1. Local private keys (Backend/CLI)
/// 2. Browser wallets that implement `eth_signTypedData_v4`
#[async_trait]
pub trait JourneySigner: Send + Sync {
    fn address(&self) -> Address;

    /// Sign an EIP-712 decryption request.
    /// Wallets may require human approval here and suspend indefinitely.
    /// Returns Err if the user declines or the wallet is unavailable.
    async fn sign_typed_data(&self, typed_data: &DecryptionTypedData) -> Result<Bytes, String>;
}

#[async_trait]
impl JourneySigner for PrivateKeySigner {
    fn address(&self) -> Address {
        Signer::address(self)
    }

    async fn sign_typed_data(&self, typed_data: &DecryptionTypedData) -> Result<Bytes, String> {
        let hash = typed_data.signing_hash();
        let signature = Signer::sign_hash(self, &hash)
            .await
            .map_err(|e| e.to_string())?;
        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }
}
