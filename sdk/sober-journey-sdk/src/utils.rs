use crate::core::connection::{ChainLog, EvmConnection, EvmWriteConnection, TxReceipt};
use crate::error::{JourneySdkError, Result};
use crate::types::ProgressRecord;
use alloy_primitives::{Address, Bytes, U256};
use sober_journey_interface::{ISoberJourneyFHE, SolCall, SolEvent};
use tracing::{debug, trace};

//=============================================================================
// Time
//=============================================================================

/// Current unix time in seconds
pub fn now_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

//=============================================================================
// Failure Classification
//=============================================================================

/// Messages the relayer produces when its backend connection drops.
/// "response" is how the relayer actually spells one of them.
const TRANSIENT_RELAYER_FAULTS: [&str; 3] = [
    "backend connection task has stopped",
    "Relayer didn't respond correctly",
    "Relayer didn't response correctly",
];

/// Whether a failure message means the relayer dropped and a fresh instance
/// may succeed.
pub fn is_transient_relayer_fault(message: &str) -> bool {
    TRANSIENT_RELAYER_FAULTS
        .iter()
        .any(|needle| message.contains(needle))
}

//=============================================================================
// Contract Calls
//=============================================================================

/// Run a view call and decode its return value
pub async fn call_view<T, C>(connection: &C, to: Address, call: &T) -> Result<T::Return>
where
    T: SolCall,
    C: EvmConnection + ?Sized,
{
    let raw = connection
        .call(to, Bytes::from(call.abi_encode()))
        .await
        .map_err(|e| JourneySdkError::Connection(e.to_string()))?;
    Ok(T::abi_decode_returns(&raw)?)
}

/// Send a state-changing call and wait for it to be mined.
///
/// A mined-but-reverted transaction is an error.
pub async fn send_call<T, C>(
    connection: &C,
    to: Address,
    call: &T,
    value: U256,
) -> Result<TxReceipt>
where
    T: SolCall,
    C: EvmWriteConnection + ?Sized,
{
    let tx_hash = connection
        .send_transaction(to, Bytes::from(call.abi_encode()), value)
        .await
        .map_err(|e| JourneySdkError::Connection(e.to_string()))?;
    debug!(%tx_hash, method = T::SIGNATURE, "Transaction sent");

    let receipt = connection
        .wait_for_receipt(tx_hash)
        .await
        .map_err(|e| JourneySdkError::Connection(e.to_string()))?;
    if !receipt.success {
        return Err(JourneySdkError::Reverted(receipt.tx_hash));
    }
    Ok(receipt)
}

//=============================================================================
// Log Decoding
//=============================================================================

/// Decode `log` as event `E` emitted by `address`
pub fn decode_event<E: SolEvent>(log: &ChainLog, address: &Address) -> Option<E> {
    if &log.address != address {
        return None;
    }
    match E::decode_raw_log(log.topics.iter().copied(), &log.data) {
        Ok(event) => Some(event),
        Err(e) => {
            trace!(event = E::SIGNATURE, "Skipping undecodable log: {}", e);
            None
        },
    }
}

/// Project a confirmed `ProgressRecorded` log. Pending logs yield `None`.
pub fn decode_progress_record(log: &ChainLog, address: &Address) -> Option<ProgressRecord> {
    let block_number = log.block_number?;
    let event = decode_event::<ISoberJourneyFHE::ProgressRecorded>(log, address)?;
    Some(ProgressRecord {
        tx_hash: log.transaction_hash.unwrap_or_default(),
        block_number,
        log_index: log.log_index,
        participant: event.participant,
        day_index: event.dayIndex.saturating_to(),
        report_cid: event.reportCID,
    })
}
