use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use sober_journey_interface::{Journey, ParticipantRecord};

/// One confirmed `ProgressRecorded` event, projected from chain logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub tx_hash: B256,
    pub block_number: u64,

    /// Position of the log inside its block, used to break ordering ties
    pub log_index: Option<u64>,

    pub participant: Address,

    /// Day counter reported by the contract at submission
    pub day_index: u64,

    /// Optional content pointer stored alongside, unencrypted
    pub report_cid: String,
}

/// Plaintext of one handle. Only meaningful while `handle` is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearValue {
    pub handle: B256,
    pub value: U256,
}

impl ClearValue {
    pub fn is_for(&self, handle: &B256) -> bool {
        &self.handle == handle
    }
}

/// How a journey validates participant reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationMode {
    None,
    Whitelist,
    Community,
}

impl From<VerificationMode> for u8 {
    fn from(mode: VerificationMode) -> Self {
        match mode {
            VerificationMode::None => 0,
            VerificationMode::Whitelist => 1,
            VerificationMode::Community => 2,
        }
    }
}

impl TryFrom<u8> for VerificationMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(VerificationMode::None),
            1 => Ok(VerificationMode::Whitelist),
            2 => Ok(VerificationMode::Community),
            other => Err(other),
        }
    }
}

/// Where a journey sits on its timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JourneyPhase {
    NotStarted,
    Active,
    Ended,
    Finalized,
}

/// Decoded `getJourneyInfo` result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JourneyInfo {
    pub journey_id: u64,
    pub creator: Address,
    pub journey_cid: String,
    pub start_time: u64,
    pub end_time: u64,
    pub days_total: u64,

    /// Wei (or token units) a participant locks on enrollment
    pub stake_amount: U256,

    /// Zero address means native currency
    pub stake_token: Address,

    pub require_evidence: bool,

    /// Raw value kept when the contract reports an unknown mode
    pub verification_mode: Result<VerificationMode, u8>,

    pub reward_pool: U256,
    pub finalized: bool,
}

impl JourneyInfo {
    /// An unset journey slot comes back zeroed
    pub fn exists(&self) -> bool {
        self.creator != Address::ZERO
    }

    pub fn phase_at(&self, now: u64) -> JourneyPhase {
        if self.finalized {
            JourneyPhase::Finalized
        } else if now < self.start_time {
            JourneyPhase::NotStarted
        } else if now > self.end_time {
            JourneyPhase::Ended
        } else {
            JourneyPhase::Active
        }
    }
}

impl From<Journey> for JourneyInfo {
    fn from(j: Journey) -> Self {
        Self {
            journey_id: j.journeyId.saturating_to(),
            creator: j.creator,
            journey_cid: j.journeyCID,
            start_time: j.startTime.saturating_to(),
            end_time: j.endTime.saturating_to(),
            days_total: j.daysTotal.saturating_to(),
            stake_amount: j.stakeAmount,
            stake_token: j.stakeToken,
            require_evidence: j.requireEvidence,
            verification_mode: VerificationMode::try_from(j.verificationMode),
            reward_pool: j.rewardPool,
            finalized: j.finalized,
        }
    }
}

/// Decoded `getParticipantInfo` result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantInfo {
    pub participant: Address,
    pub enrolled_at: u64,
    pub status: u8,
    pub stake_locked: U256,
    pub encrypted_progress_days: B256,
}

impl ParticipantInfo {
    /// The contract only writes a record on enrollment
    pub fn is_enrolled(&self, who: &Address) -> bool {
        self.participant != Address::ZERO && &self.participant == who
    }
}

impl From<ParticipantRecord> for ParticipantInfo {
    fn from(p: ParticipantRecord) -> Self {
        Self {
            participant: p.participant,
            enrolled_at: p.enrolledAt.saturating_to(),
            status: p.status,
            stake_locked: p.stakeLocked,
            encrypted_progress_days: p.encryptedProgressDays,
        }
    }
}
