pub mod decryption;
pub mod instance;
pub mod loader;
pub mod mock;
pub mod relayer;
