use crate::basic::journey::SoberJourney;
use crate::core::connection::EvmWriteConnection;
use crate::error::{JourneySdkError, Result};
use crate::types::VerificationMode;
use crate::utils::send_call;
use alloy_primitives::{Address, B256, U256};
use sober_journey_interface::ISoberJourneyFHE;
use tracing::info;

/// Outcome of a successful `startJourney`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartedJourney {
    pub journey_id: u64,
    pub tx_hash: B256,
    pub block_number: u64,
}

pub struct StartJourneyBuilder<'a> {
    journey: &'a SoberJourney,
    journey_cid: Option<String>,
    start_time: Option<u64>,
    end_time: Option<u64>,
    days_total: Option<u64>,
    stake_amount: U256,
    stake_token: Address,
    require_evidence: bool,
    verification_mode: VerificationMode,
    reward_deposit: U256,
}

impl<'a> StartJourneyBuilder<'a> {
    pub fn new(journey: &'a SoberJourney) -> Self {
        Self {
            journey,
            journey_cid: None,
            start_time: None,
            end_time: None,
            days_total: None,
            stake_amount: U256::ZERO,
            stake_token: Address::ZERO,
            require_evidence: false,
            verification_mode: VerificationMode::None,
            reward_deposit: U256::ZERO,
        }
    }

    /// Content pointer to the journey's rules
    pub fn with_cid(mut self, cid: impl Into<String>) -> Self {
        self.journey_cid = Some(cid.into());
        self
    }

    pub fn with_window(mut self, start_time: u64, end_time: u64) -> Self {
        self.start_time = Some(start_time);
        self.end_time = Some(end_time);
        self
    }

    pub fn with_days_total(mut self, days: u64) -> Self {
        self.days_total = Some(days);
        self
    }

    /// Stake each participant locks; zero `token` means native currency
    pub fn with_stake(mut self, amount: U256, token: Address) -> Self {
        self.stake_amount = amount;
        self.stake_token = token;
        self
    }

    pub fn with_require_evidence(mut self, require: bool) -> Self {
        self.require_evidence = require;
        self
    }

    pub fn with_verification_mode(mut self, mode: VerificationMode) -> Self {
        self.verification_mode = mode;
        self
    }

    /// Native value sent with the call, seeding the reward pool
    pub fn with_reward_deposit(mut self, value: U256) -> Self {
        self.reward_deposit = value;
        self
    }

    pub fn build_call(&self) -> Result<ISoberJourneyFHE::startJourneyCall> {
        let journey_cid = self
            .journey_cid
            .clone()
            .ok_or_else(|| JourneySdkError::InvalidInput("Journey CID required".into()))?;
        let start_time = self
            .start_time
            .ok_or_else(|| JourneySdkError::InvalidInput("Start time required".into()))?;
        let end_time = self
            .end_time
            .ok_or_else(|| JourneySdkError::InvalidInput("End time required".into()))?;
        let days_total = self
            .days_total
            .ok_or_else(|| JourneySdkError::InvalidInput("Total days required".into()))?;

        if end_time <= start_time {
            return Err(JourneySdkError::InvalidInput(
                "End time must be after start time".into(),
            ));
        }
        if days_total == 0 {
            return Err(JourneySdkError::InvalidInput(
                "Journey must last at least one day".into(),
            ));
        }

        Ok(ISoberJourneyFHE::startJourneyCall {
            journeyCID: journey_cid,
            startTime: U256::from(start_time),
            endTime: U256::from(end_time),
            daysTotal: U256::from(days_total),
            stakeAmount: self.stake_amount,
            stakeToken: self.stake_token,
            requireEvidence: self.require_evidence,
            verificationMode: self.verification_mode.into(),
        })
    }

    pub async fn send(&self, connection: &(impl EvmWriteConnection + ?Sized)) -> Result<StartedJourney> {
        let call = self.build_call()?;
        let receipt = send_call(connection, self.journey.address, &call, self.reward_deposit).await?;
        let journey_id = self.journey.started_journey_id(&receipt).ok_or_else(|| {
            JourneySdkError::Decode(format!(
                "No JourneyStarted event in transaction {}",
                receipt.tx_hash
            ))
        })?;
        info!(journey_id, tx_hash = %receipt.tx_hash, "Journey started");

        Ok(StartedJourney {
            journey_id,
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
        })
    }
}
