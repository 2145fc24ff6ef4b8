use alloy_primitives::{address, Address};

/// Hardhat / anvil development chain, served by the mock coprocessor
pub const LOCAL_CHAIN_ID: u64 = 31337;
pub const LOCAL_RPC_URL: &str = "http://localhost:8545";

pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

/// Window a decryption signature stays valid for
pub const DEFAULT_DECRYPTION_DURATION_DAYS: u64 = 10;
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Same-origin bundle first (avoids COEP/CORP blocking), CDN second
pub const SDK_LOCAL_URL: &str = "/relayer-sdk-js.umd.cjs";
pub const SDK_CDN_URL: &str = "https://cdn.zama.ai/relayer-sdk-js/0.1.0-9/relayer-sdk-js.umd.cjs";

// fhEVM host contracts deployed by the hardhat plugin on the local node
pub const LOCAL_ACL_ADDRESS: Address = address!("50157CFfD6bBFA2DECe204a89ec419c23ef5755D");
pub const LOCAL_INPUT_VERIFIER_ADDRESS: Address =
    address!("901F8942346f7AB3a01F6D7613119Bca447Bb030");
pub const LOCAL_KMS_VERIFIER_ADDRESS: Address =
    address!("1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC");
pub const LOCAL_DECRYPTION_VERIFYING_CONTRACT: Address =
    address!("5ffdaAB0373E62E2ea2944776209aEf29E631A64");

// Sepolia relayer deployment
pub const SEPOLIA_RELAYER_URL: &str = "https://relayer.testnet.zama.cloud";
pub const SEPOLIA_GATEWAY_CHAIN_ID: u64 = 55815;
pub const SEPOLIA_ACL_ADDRESS: Address = address!("687820221192C5B662b25367F70076A37bc79b6c");
pub const SEPOLIA_KMS_VERIFIER_ADDRESS: Address =
    address!("1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC");
pub const SEPOLIA_INPUT_VERIFIER_ADDRESS: Address =
    address!("bc91f3daD1A5F19F8390c400196e58073B6a0BC4");
pub const SEPOLIA_DECRYPTION_VERIFYING_CONTRACT: Address =
    address!("b6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1");
pub const SEPOLIA_INPUT_VERIFICATION_VERIFYING_CONTRACT: Address =
    address!("7048C39f048125eDa9d678AEbaDfB22F7900a29F");

/// Storage key prefix for persisted decryption capabilities
pub const DECRYPTION_SIGNATURE_KEY_PREFIX: &str = "fhevm.decryptionSignature";
