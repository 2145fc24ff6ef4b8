use alloy_primitives::{Address, B256};
use thiserror::Error;

/// SDK-specific error types for Sober Journey operations
#[derive(Debug, Error)]
pub enum JourneySdkError {
    /// Connection or RPC error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Neither SDK source loaded, or mock metadata could not be read
    #[error("FHEVM instance load failed: {0}")]
    InstanceLoad(String),

    /// The signer declined or failed to sign a decryption request
    #[error("Signing rejected: {0}")]
    SigningRejected(String),

    /// Submission failed with a recognised relayer disconnect message
    #[error("Transient relayer fault: {0}")]
    TransientRelayerFault(String),

    /// Encrypted mutation failed for good
    #[error("Mutation failed: {0}")]
    MutationFailed(String),

    /// Reencryption of a handle failed
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// ABI or log decoding failure
    #[error("Decode error: {0}")]
    Decode(String),

    /// No contract deployed for the chain
    #[error("No SoberJourney contract configured for chain {0}")]
    ContractNotConfigured(u64),

    /// Journey does not exist on-chain
    #[error("Journey {0} not found")]
    JourneyNotFound(u64),

    /// Transaction was mined but reverted
    #[error("Transaction {0} reverted")]
    Reverted(B256),

    /// Caller supplied an unusable argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistent string store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Content pinning failure
    #[error("Pinning error: {0}")]
    Pinning(String),

    /// Signer identity does not match the expected participant
    #[error("Signer {actual} does not match participant {expected}")]
    SignerMismatch { expected: Address, actual: Address },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<alloy::sol_types::Error> for JourneySdkError {
    fn from(err: alloy::sol_types::Error) -> Self {
        JourneySdkError::Decode(err.to_string())
    }
}

impl From<std::io::Error> for JourneySdkError {
    fn from(err: std::io::Error) -> Self {
        JourneySdkError::Store(err.to_string())
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, JourneySdkError>;
