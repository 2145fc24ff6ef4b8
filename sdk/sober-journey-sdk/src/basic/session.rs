use crate::advanced::history::load_history;
use crate::advanced::mutation::{EncryptedMutation, MutationReceipt};
use crate::basic::actions::{StartJourneyBuilder, StartedJourney};
use crate::basic::journey::SoberJourney;
use crate::basic::state::ProgressState;
use crate::core::connection::{EvmWriteConnection, TxReceipt};
use crate::core::pinning::ContentPinner;
use crate::core::signer::JourneySigner;
use crate::error::{JourneySdkError, Result};
use crate::fhevm::decryption::DecryptionSignatureCache;
use crate::fhevm::instance::HandleContractPair;
use crate::fhevm::loader::InstanceLoader;
use crate::types::{ClearValue, JourneyInfo, ParticipantInfo, ProgressRecord};
use alloy_primitives::{Address, B256, U256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One participant's view of one journey.
///
/// Ties together the instance loader, the decryption signature cache, the
/// contract and the account acting on it.
pub struct JourneySession {
    loader: Arc<InstanceLoader>,
    signatures: Arc<DecryptionSignatureCache>,
    journey: SoberJourney,
    connection: Arc<dyn EvmWriteConnection>,
    signer: Arc<dyn JourneySigner>,
    journey_id: u64,
    state: ProgressState,
    pinner: Option<Arc<dyn ContentPinner>>,
}

impl JourneySession {
    /// `signer` and `connection` must act for the same account.
    pub fn new(
        loader: Arc<InstanceLoader>,
        signatures: Arc<DecryptionSignatureCache>,
        journey: SoberJourney,
        connection: Arc<dyn EvmWriteConnection>,
        signer: Arc<dyn JourneySigner>,
        journey_id: u64,
    ) -> Result<Self> {
        check_same_account(connection.as_ref(), signer.as_ref())?;
        Ok(Self {
            loader,
            signatures,
            journey,
            connection,
            signer,
            journey_id,
            state: ProgressState::new(),
            pinner: None,
        })
    }

    pub fn with_pinner(mut self, pinner: Arc<dyn ContentPinner>) -> Self {
        self.pinner = Some(pinner);
        self
    }

    pub fn journey(&self) -> &SoberJourney {
        &self.journey
    }

    pub fn journey_id(&self) -> u64 {
        self.journey_id
    }

    /// Point the session at another journey; cached state is per journey
    pub fn set_journey_id(&mut self, journey_id: u64) {
        self.journey_id = journey_id;
    }

    pub fn participant(&self) -> Address {
        self.signer.address()
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    //=========================================================================
    // Encrypted counter
    //=========================================================================

    /// Re-read the encrypted day counter. A changed handle drops the stale
    /// clear value.
    pub async fn refresh_encrypted_progress_days(&self) -> Result<B256> {
        let handle = self
            .journey
            .get_encrypted_progress_days(
                self.connection.as_ref(),
                self.journey_id,
                self.participant(),
            )
            .await?;
        if self.state.set_handle(self.journey_id, handle).await {
            debug!(journey_id = self.journey_id, %handle, "Encrypted progress handle changed");
        }
        Ok(handle)
    }

    pub async fn handle(&self) -> Option<B256> {
        self.state.handle(self.journey_id).await
    }

    /// Decrypt the current counter.
    ///
    /// `Ok(None)` when there is nothing to decrypt yet or no decryption
    /// signature could be obtained.
    pub async fn decrypt_progress_days(&self) -> Result<Option<ClearValue>> {
        let handle = match self.state.handle(self.journey_id).await {
            Some(handle) => handle,
            None => self.refresh_encrypted_progress_days().await?,
        };
        if handle.is_zero() {
            debug!(journey_id = self.journey_id, "No progress recorded yet");
            return Ok(None);
        }

        let instance = self.loader.get_instance(self.journey.chain_id).await?;
        let capability = match self
            .signatures
            .load_or_sign(instance.as_ref(), &[self.journey.address], self.signer.as_ref())
            .await
        {
            Some(capability) => capability,
            None => return Ok(None),
        };

        let pair = HandleContractPair {
            handle,
            contract: self.journey.address,
        };
        let clear = instance.user_decrypt(&[pair], &capability).await?;
        let value = clear.get(&handle).copied().ok_or_else(|| {
            JourneySdkError::Decryption(format!("No clear value returned for {}", handle))
        })?;

        let clear = ClearValue { handle, value };
        if !self.state.set_clear(self.journey_id, clear).await {
            debug!(journey_id = self.journey_id, "Handle moved during decryption");
        }
        info!(journey_id = self.journey_id, %value, "Decrypted progress days");
        Ok(Some(clear))
    }

    /// Last decrypted value, only while it matches the current handle
    pub async fn clear_value(&self) -> Option<ClearValue> {
        self.state.clear_value(self.journey_id).await
    }

    //=========================================================================
    // Mutations
    //=========================================================================

    /// Record one more day, then re-read the handle and rebuild history.
    ///
    /// Once the transaction is mined the receipt is returned even if the
    /// follow-up reads fail; those are only logged.
    pub async fn record_progress(&self, report_cid: &str) -> Result<MutationReceipt> {
        let receipt = EncryptedMutation::new(&self.loader, &self.journey, self.connection.as_ref())
            .with_journey(self.journey_id)
            .with_delta(1)
            .with_report_cid(report_cid)
            .with_state(&self.state)
            .submit()
            .await?;

        if let Err(e) = self.refresh_encrypted_progress_days().await {
            warn!(
                journey_id = self.journey_id,
                tx_hash = %receipt.tx_hash,
                "Progress recorded but handle refresh failed: {}",
                e
            );
        }
        if let Err(e) = self.load_progress_history().await {
            warn!(
                journey_id = self.journey_id,
                tx_hash = %receipt.tx_hash,
                "Progress recorded but history reload failed: {}",
                e
            );
        }
        Ok(receipt)
    }

    /// Enroll, paying the journey's native stake if it has one
    pub async fn enroll(&self) -> Result<TxReceipt> {
        let info = self.journey_info().await?;
        let value = if info.stake_token == Address::ZERO {
            info.stake_amount
        } else {
            // Token stakes are pulled by the contract from a prior approval
            U256::ZERO
        };
        self.journey
            .enroll_in_journey(self.connection.as_ref(), self.journey_id, value)
            .await
    }

    pub async fn start_journey<F>(&self, configure: F) -> Result<StartedJourney>
    where
        F: for<'j> FnOnce(StartJourneyBuilder<'j>) -> StartJourneyBuilder<'j>,
    {
        configure(self.journey.start_journey())
            .send(self.connection.as_ref())
            .await
    }

    //=========================================================================
    // Reads
    //=========================================================================

    pub async fn journey_info(&self) -> Result<JourneyInfo> {
        self.journey
            .get_journey_info(self.connection.as_ref(), self.journey_id)
            .await
    }

    pub async fn participant_info(&self) -> Result<ParticipantInfo> {
        self.journey
            .get_participant_info(self.connection.as_ref(), self.journey_id, self.participant())
            .await
    }

    /// Rebuild this participant's history from chain logs
    pub async fn load_progress_history(&self) -> Result<Vec<ProgressRecord>> {
        let history = load_history(
            self.connection.as_ref(),
            self.journey.address,
            self.journey_id,
            self.participant(),
        )
        .await?;
        self.state
            .replace_history(self.journey_id, history.clone())
            .await;
        Ok(history)
    }

    /// History as of the last load or mutation
    pub async fn progress_history(&self) -> Vec<ProgressRecord> {
        self.state.history(self.journey_id).await
    }

    //=========================================================================
    // Evidence & identity
    //=========================================================================

    /// Pin an evidence or report file and return its CID
    pub async fn pin_evidence(&self, file_name: &str, content: Vec<u8>) -> Result<String> {
        let pinner = self
            .pinner
            .as_ref()
            .ok_or_else(|| JourneySdkError::Pinning("No content pinner configured".into()))?;
        let cid = pinner
            .pin_file(file_name, content)
            .await
            .map_err(|e| JourneySdkError::Pinning(e.to_string()))?;
        info!(file_name, cid = %cid, "Pinned evidence");
        Ok(cid)
    }

    /// Act as another account from now on.
    ///
    /// The previous account's decryption signature is discarded and every
    /// cached handle, clear value and history entry is dropped.
    pub async fn switch_signer(
        &mut self,
        signer: Arc<dyn JourneySigner>,
        connection: Arc<dyn EvmWriteConnection>,
    ) -> Result<()> {
        check_same_account(connection.as_ref(), signer.as_ref())?;

        let previous = self.signer.address();
        self.signatures
            .invalidate(self.journey.chain_id, &previous, &[self.journey.address])
            .await?;
        self.state.reset().await;

        info!(from = %previous, to = %signer.address(), "Switched signer");
        self.signer = signer;
        self.connection = connection;
        Ok(())
    }
}

fn check_same_account(
    connection: &dyn EvmWriteConnection,
    signer: &dyn JourneySigner,
) -> Result<()> {
    if connection.sender() != signer.address() {
        return Err(JourneySdkError::SignerMismatch {
            expected: connection.sender(),
            actual: signer.address(),
        });
    }
    Ok(())
}
