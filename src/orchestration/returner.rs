//! Returning matched actives to the accounts that sent the packs.

use super::pause;
use crate::domain::TxId;
use crate::engine::{doubling_backoff, Batch, TransactionGroup};
use crate::ledger::SubmitError;
use crate::market::OperatorAccount;
use backoff::backoff::Backoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

/// A batch the ledger did not accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBatch {
    pub batch: Batch,
    pub error: String,
    pub attempts: u32,
}

impl FailedBatch {
    pub fn fingerprint(&self) -> String {
        self.batch.fingerprint()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReturnReport {
    pub submitted: Vec<(Batch, TxId)>,
    pub failed: Vec<FailedBatch>,
}

impl ReturnReport {
    pub fn assets_returned(&self) -> usize {
        self.submitted.iter().map(|(b, _)| b.asset_ids.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct ReturnExecutor {
    account: OperatorAccount,
    delay: Duration,
    retry_attempts: u32,
}

impl ReturnExecutor {
    pub fn new(account: OperatorAccount, delay: Duration) -> Self {
        Self {
            account,
            delay,
            retry_attempts: 0,
        }
    }

    /// Extra attempts per failed batch, spaced by a doubling backoff that
    /// starts at the inter-batch delay.
    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    /// One bulk transfer per batch, recipient by recipient.
    pub async fn execute(&self, group: TransactionGroup) -> ReturnReport {
        let mut report = ReturnReport::default();

        for (i, batch) in group.into_batches().into_iter().enumerate() {
            if i > 0 {
                pause(self.delay).await;
            }

            match self.submit_batch(&batch).await {
                Ok(tx) => {
                    info!(
                        recipient = %batch.recipient,
                        count = batch.asset_ids.len(),
                        tx_id = %tx,
                        "Actives returned"
                    );
                    report.submitted.push((batch, tx));
                }
                Err((e, attempts)) => {
                    error!(
                        recipient = %batch.recipient,
                        count = batch.asset_ids.len(),
                        attempts,
                        error = %e,
                        "Return batch failed"
                    );
                    report.failed.push(FailedBatch {
                        batch,
                        error: e.to_string(),
                        attempts,
                    });
                }
            }
        }

        report
    }

    async fn submit_batch(&self, batch: &Batch) -> Result<TxId, (SubmitError, u32)> {
        let mut schedule = doubling_backoff(self.delay);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self
                .account
                .bulk_transfer(&batch.recipient, &batch.asset_ids, "")
                .await
            {
                Ok(tx) => return Ok(tx),
                Err(e) if attempts <= self.retry_attempts => {
                    let wait = schedule.next_backoff().unwrap_or(self.delay);
                    warn!(
                        recipient = %batch.recipient,
                        attempt = attempts,
                        error = %e,
                        "Return batch rejected, retrying"
                    );
                    pause(wait).await;
                }
                Err(e) => return Err((e, attempts)),
            }
        }
    }
}
