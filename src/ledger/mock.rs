//! Recording submitter for tests.

use super::{Action, ActionSubmitter, SubmitError};
use crate::domain::TxId;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MockState {
    submitted: Vec<Vec<Action>>,
    queued_errors: VecDeque<SubmitError>,
    failing_assets: HashSet<String>,
    next_tx: u64,
}

/// Accepts every transaction unless told otherwise and remembers what it saw.
///
/// Only successful submissions are recorded.
#[derive(Debug, Default)]
pub struct MockSubmitter {
    state: Mutex<MockState>,
}

impl MockSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every transaction touching this asset.
    pub fn with_failing_asset(self, asset_id: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.failing_assets.insert(asset_id.to_string());
        }
        self
    }

    /// Fail the next submission with `err`, before any other rule applies.
    pub fn with_queued_error(self, err: SubmitError) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.queued_errors.push_back(err);
        }
        self
    }

    pub fn submitted(&self) -> Vec<Vec<Action>> {
        self.state
            .lock()
            .map(|s| s.submitted.clone())
            .unwrap_or_default()
    }

    /// Successful submissions whose first action has the given name.
    pub fn submitted_named(&self, name: &str) -> Vec<Vec<Action>> {
        self.submitted()
            .into_iter()
            .filter(|tx| tx.first().map(|a| a.name == name).unwrap_or(false))
            .collect()
    }
}

#[async_trait]
impl ActionSubmitter for MockSubmitter {
    async fn submit(&self, actions: &[Action]) -> Result<TxId, SubmitError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SubmitError::Signer("mock state poisoned".to_string()))?;

        if let Some(err) = state.queued_errors.pop_front() {
            return Err(err);
        }

        if let Some(id) = actions
            .iter()
            .flat_map(Action::asset_ids)
            .find(|id| state.failing_assets.contains(id))
        {
            return Err(SubmitError::Rejected(format!("asset {} is locked", id)));
        }

        state.next_tx += 1;
        state.submitted.push(actions.to_vec());
        Ok(TxId::new(format!("tx{}", state.next_tx)))
    }
}
