use crate::basic::actions::StartJourneyBuilder;
use crate::core::connection::{EvmConnection, EvmWriteConnection, TxReceipt};
use crate::error::{JourneySdkError, Result};
use crate::types::{JourneyInfo, ParticipantInfo};
use crate::utils::{self, call_view, send_call};
use alloy_primitives::{Address, Bytes, B256, U256};
use sober_journey_interface::ISoberJourneyFHE;
use tracing::info;

/// A deployed SoberJourneyFHE contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoberJourney {
    /// Contract address
    pub address: Address,

    /// Chain the contract lives on
    pub chain_id: u64,
}

impl SoberJourney {
    pub fn new(address: Address, chain_id: u64) -> Self {
        Self { address, chain_id }
    }

    /// Resolve the deployment for the connection's chain
    pub async fn for_connection(
        connection: &(impl EvmConnection + ?Sized),
        config: &crate::config::JourneyConfig,
    ) -> Result<Self> {
        let chain_id = connection
            .get_chain_id()
            .await
            .map_err(|e| JourneySdkError::Connection(e.to_string()))?;
        Ok(Self::new(config.contract_address(chain_id)?, chain_id))
    }

    //=========================================================================
    // Reads
    //=========================================================================

    /// Id the next `startJourney` will be assigned
    pub async fn next_journey_id(&self, connection: &(impl EvmConnection + ?Sized)) -> Result<u64> {
        let next = call_view(connection, self.address, &ISoberJourneyFHE::nextJourneyIdCall {}).await?;
        Ok(next.saturating_to())
    }

    pub async fn get_journey_info(
        &self,
        connection: &(impl EvmConnection + ?Sized),
        journey_id: u64,
    ) -> Result<JourneyInfo> {
        let call = ISoberJourneyFHE::getJourneyInfoCall {
            journeyId: U256::from(journey_id),
        };
        let info = JourneyInfo::from(call_view(connection, self.address, &call).await?);
        if !info.exists() {
            return Err(JourneySdkError::JourneyNotFound(journey_id));
        }
        Ok(info)
    }

    pub async fn get_participant_info(
        &self,
        connection: &(impl EvmConnection + ?Sized),
        journey_id: u64,
        participant: Address,
    ) -> Result<ParticipantInfo> {
        let call = ISoberJourneyFHE::getParticipantInfoCall {
            journeyId: U256::from(journey_id),
            participant,
        };
        Ok(ParticipantInfo::from(
            call_view(connection, self.address, &call).await?,
        ))
    }

    /// Current encrypted day counter; zero until the first record
    pub async fn get_encrypted_progress_days(
        &self,
        connection: &(impl EvmConnection + ?Sized),
        journey_id: u64,
        participant: Address,
    ) -> Result<B256> {
        let call = ISoberJourneyFHE::getEncryptedProgressDaysCall {
            journeyId: U256::from(journey_id),
            participant,
        };
        call_view(connection, self.address, &call).await
    }

    /// All journeys created so far, oldest first
    pub async fn list_journeys(
        &self,
        connection: &(impl EvmConnection + ?Sized),
    ) -> Result<Vec<JourneyInfo>> {
        let next = self.next_journey_id(connection).await?;
        let mut journeys = Vec::new();
        for journey_id in 1..next {
            match self.get_journey_info(connection, journey_id).await {
                Ok(info) => journeys.push(info),
                Err(JourneySdkError::JourneyNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(journeys)
    }

    //=========================================================================
    // Writes
    //=========================================================================

    pub fn start_journey(&self) -> StartJourneyBuilder<'_> {
        StartJourneyBuilder::new(self)
    }

    /// Enroll the connection's account, locking `stake` alongside
    pub async fn enroll_in_journey(
        &self,
        connection: &(impl EvmWriteConnection + ?Sized),
        journey_id: u64,
        stake: U256,
    ) -> Result<TxReceipt> {
        let call = ISoberJourneyFHE::enrollInJourneyCall {
            journeyId: U256::from(journey_id),
        };
        let receipt = send_call(connection, self.address, &call, stake).await?;
        info!(journey_id, tx_hash = %receipt.tx_hash, "Enrolled in journey");
        Ok(receipt)
    }

    /// Submit an already-encrypted increment
    pub async fn record_progress(
        &self,
        connection: &(impl EvmWriteConnection + ?Sized),
        journey_id: u64,
        report_cid: &str,
        enc_increment: B256,
        input_proof: Bytes,
    ) -> Result<TxReceipt> {
        let call = ISoberJourneyFHE::recordProgressCall {
            journeyId: U256::from(journey_id),
            reportCID: report_cid.to_string(),
            encIncrement: enc_increment,
            inputProof: input_proof,
        };
        send_call(connection, self.address, &call, U256::ZERO).await
    }

    /// Approve or reject a participant's day as a validator
    pub async fn validate_progress(
        &self,
        connection: &(impl EvmWriteConnection + ?Sized),
        journey_id: u64,
        participant: Address,
        day_index: u64,
        approve: bool,
        evidence_cid: &str,
    ) -> Result<TxReceipt> {
        let call = ISoberJourneyFHE::validateProgressCall {
            journeyId: U256::from(journey_id),
            participant,
            dayIndex: U256::from(day_index),
            approve,
            evidenceCID: evidence_cid.to_string(),
        };
        send_call(connection, self.address, &call, U256::ZERO).await
    }

    /// Journey id announced by a `JourneyStarted` log in `receipt`
    pub fn started_journey_id(&self, receipt: &TxReceipt) -> Option<u64> {
        receipt
            .logs
            .iter()
            .find_map(|log| utils::decode_event::<ISoberJourneyFHE::JourneyStarted>(log, &self.address))
            .map(|event| event.journeyId.saturating_to())
    }
}
