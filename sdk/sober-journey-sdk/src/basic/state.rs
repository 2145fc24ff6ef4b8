use crate::types::{ClearValue, ProgressRecord};
use alloy_primitives::B256;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// What the client currently knows about one journey for one participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JourneyProgress {
    /// Last handle read from the contract
    pub handle: Option<B256>,

    /// Decrypted value, kept only while it matches `handle`
    pub clear: Option<ClearValue>,

    /// Ordered by (block_number, log_index)
    pub history: Vec<ProgressRecord>,
}

/// Client-side progress cache, keyed by journey id.
#[derive(Debug, Default)]
pub struct ProgressState {
    journeys: RwLock<HashMap<u64, JourneyProgress>>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self, journey_id: u64) -> JourneyProgress {
        self.journeys
            .read()
            .await
            .get(&journey_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn handle(&self, journey_id: u64) -> Option<B256> {
        self.journeys
            .read()
            .await
            .get(&journey_id)
            .and_then(|p| p.handle)
    }

    /// Store a freshly read handle. Returns true if it changed, in which case
    /// any clear value for the old handle is dropped.
    pub async fn set_handle(&self, journey_id: u64, handle: B256) -> bool {
        let mut journeys = self.journeys.write().await;
        let progress = journeys.entry(journey_id).or_default();
        if progress.handle == Some(handle) {
            return false;
        }
        progress.handle = Some(handle);
        progress.clear = None;
        true
    }

    /// Forget the handle after a mutation has superseded it
    pub async fn invalidate_handle(&self, journey_id: u64) {
        if let Some(progress) = self.journeys.write().await.get_mut(&journey_id) {
            progress.handle = None;
            progress.clear = None;
        }
    }

    /// Accept `clear` only if it belongs to the current handle
    pub async fn set_clear(&self, journey_id: u64, clear: ClearValue) -> bool {
        let mut journeys = self.journeys.write().await;
        match journeys.get_mut(&journey_id) {
            Some(progress) if progress.handle == Some(clear.handle) => {
                progress.clear = Some(clear);
                true
            },
            _ => false,
        }
    }

    pub async fn clear_value(&self, journey_id: u64) -> Option<ClearValue> {
        let journeys = self.journeys.read().await;
        let progress = journeys.get(&journey_id)?;
        let handle = progress.handle?;
        progress.clear.filter(|c| c.is_for(&handle))
    }

    pub async fn history(&self, journey_id: u64) -> Vec<ProgressRecord> {
        self.journeys
            .read()
            .await
            .get(&journey_id)
            .map(|p| p.history.clone())
            .unwrap_or_default()
    }

    pub async fn replace_history(&self, journey_id: u64, history: Vec<ProgressRecord>) {
        self.journeys
            .write()
            .await
            .entry(journey_id)
            .or_default()
            .history = history;
    }

    /// Insert in order, ignoring a record already present
    pub async fn append_record(&self, journey_id: u64, record: ProgressRecord) {
        let mut journeys = self.journeys.write().await;
        let history = &mut journeys.entry(journey_id).or_default().history;
        if history
            .iter()
            .any(|r| r.tx_hash == record.tx_hash && r.log_index == record.log_index)
        {
            return;
        }
        let key = (record.block_number, record.log_index);
        let position = history.partition_point(|r| (r.block_number, r.log_index) <= key);
        history.insert(position, record);
    }

    pub async fn reset(&self) {
        self.journeys.write().await.clear();
    }
}
