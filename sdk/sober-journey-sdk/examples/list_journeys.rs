// Example: listing every journey on the connected chain
//
//   RPC_URL=http://localhost:8545 cargo run --example list_journeys

use sober_journey_sdk::types::JourneyPhase;
use sober_journey_sdk::utils::now_secs;
use sober_journey_sdk::{AlloyConnection, JourneyConfig, SoberJourney};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = JourneyConfig::from_env()?;
    let rpc_url = std::env::var("RPC_URL").unwrap_or_else(|_| "http://localhost:8545".to_string());

    let connection = AlloyConnection::connect_http(&rpc_url)?;
    let journey = SoberJourney::for_connection(&connection, &config).await?;
    println!("SoberJourneyFHE at {} (chain {})", journey.address, journey.chain_id);

    let now = now_secs();
    for info in journey.list_journeys(&connection).await? {
        let phase = match info.phase_at(now) {
            JourneyPhase::NotStarted => "upcoming",
            JourneyPhase::Active => "active",
            JourneyPhase::Ended => "ended",
            JourneyPhase::Finalized => "finalized",
        };
        println!(
            "  #{} [{}] {} days, stake {} - {}",
            info.journey_id, phase, info.days_total, info.stake_amount, info.journey_cid
        );
    }

    Ok(())
}
