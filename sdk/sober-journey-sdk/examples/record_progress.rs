// Example: recording one day of progress on a local fhEVM dev chain
//
// Expects a node at FHEVM_LOCAL_RPC_URL (default http://localhost:8545)
// with SoberJourneyFHE deployed at SOBER_JOURNEY_LOCAL_ADDRESS.
//
//   PRIVATE_KEY=0x... JOURNEY_ID=1 cargo run --example record_progress

use alloy::signers::local::PrivateKeySigner;
use sober_journey_sdk::core::constants::LOCAL_CHAIN_ID;
use sober_journey_sdk::fhevm::relayer::NoRelayerSdk;
use sober_journey_sdk::{
    AlloyConnection, AlloyRpcConnector, DecryptionSignatureCache, InstanceLoader, JourneyConfig,
    JourneySession, JsonFileStore, SoberJourney,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = JourneyConfig::from_env()?;
    let signer: PrivateKeySigner = std::env::var("PRIVATE_KEY")?.parse()?;
    let journey_id: u64 = std::env::var("JOURNEY_ID")?.parse()?;

    let rpc_url = config
        .fhevm
        .mock_chain(LOCAL_CHAIN_ID)
        .map(|c| c.rpc_url.clone())
        .ok_or("No local chain configured")?;
    let connection = Arc::new(AlloyConnection::connect_http_with_signer(
        &rpc_url,
        signer.clone(),
    )?);
    let journey = SoberJourney::for_connection(connection.as_ref(), &config).await?;

    // Mock chains never touch the relayer SDK
    let loader = Arc::new(InstanceLoader::new(
        config.fhevm.clone(),
        Arc::new(NoRelayerSdk),
        Arc::new(AlloyRpcConnector),
    ));
    let signatures = Arc::new(
        DecryptionSignatureCache::new(Arc::new(JsonFileStore::new(".sober-journey.json")))
            .with_duration_days(config.decryption_duration_days),
    );

    let session = JourneySession::new(
        loader,
        signatures,
        journey,
        connection,
        Arc::new(signer),
        journey_id,
    )?;

    let info = session.journey_info().await?;
    println!("Journey {}: {}", info.journey_id, info.journey_cid);
    if !session.participant_info().await?.is_enrolled(&session.participant()) {
        println!("Enrolling {}", session.participant());
        session.enroll().await?;
    }

    let receipt = session.record_progress("").await?;
    println!("Recorded progress:");
    println!("  Tx: {}", receipt.tx_hash);
    println!("  Block: {}", receipt.block_number);
    println!("  Attempts: {}", receipt.attempts);
    if let Some(record) = &receipt.record {
        println!("  Day: {}", record.day_index);
    }

    println!("History:");
    for record in session.progress_history().await {
        println!("  block {} day {} {}", record.block_number, record.day_index, record.tx_hash);
    }

    Ok(())
}
