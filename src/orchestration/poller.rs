//! Waiting for the indexer to show every minted active.

use super::pause;
use crate::domain::{AccountName, AssetId, PollOutcome};
use crate::indexer::{AssetFilter, Indexer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    pub outcome: PollOutcome,
    /// Last successful observation; empty if every query failed.
    pub actives: Vec<AssetId>,
}

/// Bounded re-query of the operator's actives until the count matches.
#[derive(Debug, Clone)]
pub struct ConvergencePoller {
    indexer: Arc<dyn Indexer>,
    owner: AccountName,
    filter: AssetFilter,
    max_attempts: u32,
    delay: Duration,
}

impl ConvergencePoller {
    pub fn new(
        indexer: Arc<dyn Indexer>,
        owner: AccountName,
        filter: AssetFilter,
        max_attempts: u32,
        delay: Duration,
    ) -> Self {
        Self {
            indexer,
            owner,
            filter,
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Query at most `max_attempts` times. A failed query uses up an attempt.
    pub async fn poll(&self, expected: usize) -> PollResult {
        let mut actives = Vec::new();

        for attempt in 1..=self.max_attempts {
            match self.indexer.list_owned(&self.owner, &self.filter).await {
                Ok(observed) => {
                    info!(
                        attempt,
                        observed = observed.len(),
                        expected,
                        "Polled actives"
                    );
                    let converged = observed.len() == expected;
                    actives = observed;
                    if converged {
                        return PollResult {
                            outcome: PollOutcome::Converged { attempts: attempt },
                            actives,
                        };
                    }
                }
                Err(e) => warn!(attempt, error = %e, "Active query failed"),
            }

            if attempt < self.max_attempts {
                pause(self.delay).await;
            }
        }

        warn!(
            attempts = self.max_attempts,
            observed = actives.len(),
            expected,
            "Actives did not converge, continuing with last observation"
        );
        PollResult {
            outcome: PollOutcome::Exhausted {
                attempts: self.max_attempts,
            },
            actives,
        }
    }
}
