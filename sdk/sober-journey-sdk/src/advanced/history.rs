//! Progress history rebuilt from `ProgressRecorded` logs.
//!
//! The chain is the source of truth: nothing here is cached, every call
//! rescans from genesis. Logs that fail to decode, belong to another
//! participant, or are still pending are dropped.

use crate::core::connection::{ChainLog, EvmConnection, LogFilter};
use crate::error::{JourneySdkError, Result};
use crate::types::ProgressRecord;
use crate::utils::{decode_event, decode_progress_record};
use alloy_primitives::{Address, U256};
use sober_journey_interface::{journey_topic, ISoberJourneyFHE, SolEvent};
use tracing::debug;

/// Load the ordered progress history of `participant` in `journey_id`.
pub async fn load_history(
    connection: &(impl EvmConnection + ?Sized),
    contract: Address,
    journey_id: u64,
    participant: Address,
) -> Result<Vec<ProgressRecord>> {
    let latest = connection
        .get_block_number()
        .await
        .map_err(|e| JourneySdkError::Connection(e.to_string()))?;

    let filter = LogFilter::new(contract, ISoberJourneyFHE::ProgressRecorded::SIGNATURE_HASH)
        .with_topic(1, journey_topic(journey_id))
        .with_range(0, latest);
    let logs = connection
        .get_logs(&filter)
        .await
        .map_err(|e| JourneySdkError::Connection(e.to_string()))?;

    let history = project_history(&logs, contract, journey_id, participant);
    debug!(
        journey_id,
        %participant,
        scanned = logs.len(),
        kept = history.len(),
        "Loaded progress history"
    );
    Ok(history)
}

/// Pure projection of raw logs into an ordered history.
///
/// Journey id and participant are re-checked here even though the filter
/// already narrowed by journey: providers are not trusted to filter.
pub fn project_history(
    logs: &[ChainLog],
    contract: Address,
    journey_id: u64,
    participant: Address,
) -> Vec<ProgressRecord> {
    let journey = U256::from(journey_id);
    let mut history: Vec<ProgressRecord> = logs
        .iter()
        .filter(|log| {
            decode_event::<ISoberJourneyFHE::ProgressRecorded>(log, &contract)
                .map(|event| event.journeyId == journey && event.participant == participant)
                .unwrap_or(false)
        })
        .filter_map(|log| decode_progress_record(log, &contract))
        .collect();

    history.sort_by_key(|r| (r.block_number, r.log_index));
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, B256};

    fn progress_log(contract: Address, journey: u64, who: Address, block: Option<u64>, index: u64) -> ChainLog {
        let event = ISoberJourneyFHE::ProgressRecorded {
            journeyId: U256::from(journey),
            participant: who,
            dayIndex: U256::from(block.unwrap_or_default()),
            reportCID: String::new(),
        };
        let data = event.encode_log_data();
        ChainLog {
            address: contract,
            topics: data.topics().to_vec(),
            data: data.data.clone(),
            block_number: block,
            log_index: Some(index),
            transaction_hash: Some(B256::with_last_byte(index as u8)),
        }
    }

    #[test]
    fn test_sorted_by_block_then_log_index() {
        let contract = Address::repeat_byte(0xcc);
        let me = Address::repeat_byte(1);
        let logs = vec![
            progress_log(contract, 1, me, Some(5), 3),
            progress_log(contract, 1, me, Some(2), 1),
            progress_log(contract, 1, me, Some(8), 2),
            progress_log(contract, 1, me, Some(5), 0),
        ];
        let history = project_history(&logs, contract, 1, me);
        let keys: Vec<_> = history.iter().map(|r| (r.block_number, r.log_index)).collect();
        assert_eq!(keys, vec![(2, Some(1)), (5, Some(0)), (5, Some(3)), (8, Some(2))]);
    }

    #[test]
    fn test_foreign_pending_and_garbage_logs_dropped() {
        let contract = Address::repeat_byte(0xcc);
        let me = Address::repeat_byte(1);
        let other = Address::repeat_byte(2);
        let mut garbage = progress_log(contract, 1, me, Some(4), 9);
        garbage.data = Bytes::from_static(&[1, 2, 3]);

        let logs = vec![
            progress_log(contract, 1, other, Some(3), 0),
            progress_log(contract, 2, me, Some(3), 1),
            progress_log(contract, 1, me, None, 2),
            progress_log(Address::repeat_byte(0xdd), 1, me, Some(3), 3),
            garbage,
            progress_log(contract, 1, me, Some(6), 4),
        ];
        let history = project_history(&logs, contract, 1, me);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].block_number, 6);
        assert_eq!(history[0].participant, me);
    }
}
