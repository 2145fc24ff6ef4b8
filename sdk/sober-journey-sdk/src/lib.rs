pub mod advanced;
pub mod basic;
pub mod config;
pub mod core;
pub mod error;
pub mod fhevm;
pub mod provider;
pub mod types;
pub mod utils;

pub use crate::advanced::history::{load_history, project_history};
pub use crate::advanced::mutation::{EncryptedMutation, MutationReceipt};
pub use crate::basic::actions::{StartJourneyBuilder, StartedJourney};
pub use crate::basic::journey::SoberJourney;
pub use crate::basic::session::JourneySession;
pub use crate::basic::state::{JourneyProgress, ProgressState};
pub use crate::config::{FhevmConfig, JourneyConfig, MockChainConfig, NetworkInstanceConfig};
pub use crate::core::connection::{EvmConnection, EvmWriteConnection, RpcConnector};
pub use crate::core::pinning::ContentPinner;
pub use crate::core::signer::JourneySigner;
pub use crate::core::store::{InMemoryStore, JsonFileStore, StringStore};
pub use crate::error::{JourneySdkError, Result};
pub use crate::fhevm::decryption::{DecryptionCapability, DecryptionSignatureCache};
pub use crate::fhevm::instance::{FheInstance, InstanceMode};
pub use crate::fhevm::loader::InstanceLoader;
pub use crate::provider::{AlloyConnection, AlloyRpcConnector};
pub use crate::types::{ClearValue, JourneyInfo, ParticipantInfo, ProgressRecord};
pub use crate::utils::is_transient_relayer_fault;

pub mod interface {
    pub use sober_journey_interface::*;
}
