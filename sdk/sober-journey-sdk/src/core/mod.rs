pub mod connection;
pub mod constants;
pub mod pinning;
pub mod signer;
pub mod store;
