use crate::basic::journey::SoberJourney;
use crate::basic::state::ProgressState;
use crate::core::connection::{ChainLog, EvmWriteConnection, TxReceipt};
use crate::error::{JourneySdkError, Result};
use crate::fhevm::instance::EncryptedInputRequest;
use crate::fhevm::loader::InstanceLoader;
use crate::types::ProgressRecord;
use crate::utils::{decode_progress_record, is_transient_relayer_fault};
use alloy_primitives::{Address, B256};
use tracing::{debug, info, warn};

/// Submissions allowed per mutation: the first try plus one after a refresh
pub const MAX_ATTEMPTS: u8 = 2;

/// Result of a confirmed encrypted mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReceipt {
    pub tx_hash: B256,
    pub block_number: u64,

    /// 1, or 2 if a relayer fault forced a retry
    pub attempts: u8,

    /// This participant's `ProgressRecorded` entry, if the receipt carried one
    pub record: Option<ProgressRecord>,
}

/// Encrypt a progress delta and submit it with `recordProgress`.
///
/// Mutations are not serialized against each other; a caller that needs
/// one-at-a-time semantics must wait for `submit` before starting another.
pub struct EncryptedMutation<'a, C: EvmWriteConnection + ?Sized> {
    loader: &'a InstanceLoader,
    journey: &'a SoberJourney,
    connection: &'a C,
    journey_id: Option<u64>,
    delta: u32,
    report_cid: String,
    state: Option<&'a ProgressState>,
}

impl<'a, C: EvmWriteConnection + ?Sized> EncryptedMutation<'a, C> {
    pub fn new(loader: &'a InstanceLoader, journey: &'a SoberJourney, connection: &'a C) -> Self {
        Self {
            loader,
            journey,
            connection,
            journey_id: None,
            delta: 1,
            report_cid: String::new(),
            state: None,
        }
    }

    pub fn with_journey(mut self, journey_id: u64) -> Self {
        self.journey_id = Some(journey_id);
        self
    }

    /// Plaintext increment, encrypted as euint32
    pub fn with_delta(mut self, delta: u32) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_report_cid(mut self, cid: impl Into<String>) -> Self {
        self.report_cid = cid.into();
        self
    }

    /// Client cache to update once the mutation is confirmed
    pub fn with_state(mut self, state: &'a ProgressState) -> Self {
        self.state = Some(state);
        self
    }

    pub async fn submit(&self) -> Result<MutationReceipt> {
        let journey_id = self
            .journey_id
            .ok_or_else(|| JourneySdkError::InvalidInput("Journey id required".into()))?;
        let user = self.connection.sender();

        let mut attempt = 1;
        loop {
            debug!(journey_id, attempt, "Encrypting and recording progress");
            let outcome = self.attempt(journey_id, user).await.map_err(classify);
            match outcome {
                Ok(receipt) => return Ok(self.finish(journey_id, user, receipt, attempt).await),
                Err(JourneySdkError::TransientRelayerFault(message)) if attempt < MAX_ATTEMPTS => {
                    warn!(
                        journey_id,
                        attempt,
                        "Relayer connection dropped, refreshing FHEVM instance and retrying: {}",
                        message
                    );
                    self.loader.refresh().await;
                    attempt += 1;
                },
                Err(JourneySdkError::TransientRelayerFault(message)) => {
                    warn!(journey_id, attempt, "recordProgress failed after refresh: {}", message);
                    return Err(JourneySdkError::MutationFailed(message));
                },
                Err(e) => {
                    warn!(journey_id, attempt, "recordProgress failed: {}", e);
                    return Err(e);
                },
            }
        }
    }

    async fn attempt(&self, journey_id: u64, user: Address) -> Result<TxReceipt> {
        let instance = self.loader.get_instance(self.journey.chain_id).await?;

        let request = EncryptedInputRequest::new(self.journey.address, user).add32(self.delta);
        let encrypted = instance.encrypt(&request).await?;
        let handle = encrypted.handles.first().copied().ok_or_else(|| {
            JourneySdkError::Other("Encryption produced no handle".to_string())
        })?;

        self.journey
            .record_progress(
                self.connection,
                journey_id,
                &self.report_cid,
                handle,
                encrypted.input_proof,
            )
            .await
    }

    async fn finish(
        &self,
        journey_id: u64,
        user: Address,
        receipt: TxReceipt,
        attempts: u8,
    ) -> MutationReceipt {
        let record = progress_record_in(&receipt, self.journey.address, journey_id, user);

        if let Some(state) = self.state {
            // The counter moved on-chain; the old handle and its clear value are stale
            state.invalidate_handle(journey_id).await;
            if let Some(record) = &record {
                state.append_record(journey_id, record.clone()).await;
            }
        }

        info!(
            journey_id,
            attempts,
            tx_hash = %receipt.tx_hash,
            day_index = record.as_ref().map(|r| r.day_index),
            "Progress recorded"
        );

        MutationReceipt {
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            attempts,
            record,
        }
    }
}

/// Every failure becomes either a retryable relayer fault or a terminal one.
/// Instance load failures keep their kind.
fn classify(err: JourneySdkError) -> JourneySdkError {
    match err {
        JourneySdkError::TransientRelayerFault(_)
        | JourneySdkError::MutationFailed(_)
        | JourneySdkError::InstanceLoad(_) => err,
        other => {
            let message = other.to_string();
            if is_transient_relayer_fault(&message) {
                JourneySdkError::TransientRelayerFault(message)
            } else {
                JourneySdkError::MutationFailed(message)
            }
        },
    }
}

/// `user`'s `ProgressRecorded` entry for `journey_id` in a mined receipt
pub fn progress_record_in(
    receipt: &TxReceipt,
    contract: Address,
    journey_id: u64,
    user: Address,
) -> Option<ProgressRecord> {
    receipt.logs.iter().find_map(|log| {
        let log = ChainLog {
            block_number: log.block_number.or(Some(receipt.block_number)),
            transaction_hash: log.transaction_hash.or(Some(receipt.tx_hash)),
            ..log.clone()
        };
        let record = decode_progress_record(&log, &contract)?;
        let topic_matches = log.topics.get(1) == Some(&sober_journey_interface::journey_topic(journey_id));
        (topic_matches && record.participant == user).then_some(record)
    })
}
