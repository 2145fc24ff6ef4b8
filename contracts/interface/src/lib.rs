//! SoberJourneyFHE ABI surface
//!
//! Method names, argument order and event field order match the deployed
//! contract exactly. Anything that touches calldata or log topics goes
//! through these bindings.

use alloy_primitives::{B256, U256};
use alloy_sol_types::sol;

pub use alloy_sol_types::{SolCall, SolEvent, SolInterface, SolStruct};

sol! {
    /// Journey configuration as returned by `getJourneyInfo`.
    #[derive(Debug, PartialEq, Eq)]
    struct Journey {
        uint256 journeyId;
        address creator;
        string journeyCID;
        uint256 startTime;
        uint256 endTime;
        uint256 daysTotal;
        uint256 stakeAmount;
        address stakeToken;
        bool requireEvidence;
        uint8 verificationMode;
        uint256 rewardPool;
        bool finalized;
    }

    /// Participant record as returned by `getParticipantInfo`.
    #[derive(Debug, PartialEq, Eq)]
    struct ParticipantRecord {
        address participant;
        uint256 enrolledAt;
        uint8 status;
        uint256 stakeLocked;
        bytes32 encryptedProgressDays;
    }

    #[derive(Debug, PartialEq, Eq)]
    interface ISoberJourneyFHE {
        event JourneyStarted(uint256 indexed journeyId, address indexed creator, string journeyCID);
        event ParticipantEnrolled(uint256 indexed journeyId, address indexed participant);
        event ProgressRecorded(uint256 indexed journeyId, address indexed participant, uint256 dayIndex, string reportCID);
        event ProgressValidated(uint256 indexed journeyId, address indexed participant, uint256 dayIndex, address indexed validator, bool approve);
        event ParticipantFailed(uint256 indexed journeyId, address indexed participant, string evidenceCID);
        event JourneyFinalized(uint256 indexed journeyId, uint256 rewardPool, uint256 winnersCount);
        event RewardsClaimed(uint256 indexed journeyId, address indexed participant, uint256 amount);

        function startJourney(
            string journeyCID,
            uint256 startTime,
            uint256 endTime,
            uint256 daysTotal,
            uint256 stakeAmount,
            address stakeToken,
            bool requireEvidence,
            uint8 verificationMode
        ) external payable returns (uint256 journeyId);

        function nextJourneyId() external view returns (uint256);

        function enrollInJourney(uint256 journeyId) external payable;

        function recordProgress(uint256 journeyId, string reportCID, bytes32 encIncrement, bytes inputProof) external;

        function validateProgress(uint256 journeyId, address participant, uint256 dayIndex, bool approve, string evidenceCID) external;

        function getJourneyInfo(uint256 journeyId) external view returns (Journey memory);

        function getParticipantInfo(uint256 journeyId, address participant) external view returns (ParticipantRecord memory);

        function getEncryptedProgressDays(uint256 journeyId, address participant) external view returns (bytes32);
    }

    /// ERC-5267 domain getter exposed by the fhEVM InputVerifier.
    #[derive(Debug, PartialEq, Eq)]
    interface IEip712Domain {
        function eip712Domain() external view returns (
            bytes1 fields,
            string name,
            string version,
            uint256 chainId,
            address verifyingContract,
            bytes32 salt,
            uint256[] extensions
        );
    }

    /// Typed data a user signs to authorize reencryption of their handles.
    #[derive(Debug, PartialEq, Eq)]
    struct UserDecryptRequestVerification {
        bytes publicKey;
        address[] contractAddresses;
        uint256 contractsChainId;
        uint256 startTimestamp;
        uint256 durationDays;
    }

    /// Typed data the coprocessor signs over freshly encrypted input handles.
    #[derive(Debug, PartialEq, Eq)]
    struct CiphertextVerification {
        bytes32[] ctHandles;
        address userAddress;
        address contractAddress;
        uint256 contractChainId;
    }
}

/// Indexed `uint256 journeyId` as it appears in topic 1 of journey events.
pub fn journey_topic(journey_id: u64) -> B256 {
    B256::from(U256::from(journey_id))
}
