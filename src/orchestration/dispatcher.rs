//! Sending packs to the minting account while remembering who sent them.

use super::pause;
use crate::domain::{AccountName, AssetId};
use crate::market::Gateway;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// One entry per successful transfer, in dispatch order.
    pub senders: Vec<AccountName>,
    pub transferred: Vec<AssetId>,
    /// Packs left in place, with the reason.
    pub dropped: Vec<(AssetId, String)>,
}

#[derive(Debug, Clone)]
pub struct TransferDispatcher {
    gateway: Gateway,
    minting_account: AccountName,
    memo: String,
    delay: Duration,
}

impl TransferDispatcher {
    pub fn new(
        gateway: Gateway,
        minting_account: AccountName,
        memo: impl Into<String>,
        delay: Duration,
    ) -> Self {
        Self {
            gateway,
            minting_account,
            memo: memo.into(),
            delay,
        }
    }

    /// Resolve each pack's sender, then transfer it for opening.
    ///
    /// A sender is recorded only once its pack's transfer was accepted.
    pub async fn dispatch(&self, packs: &[AssetId]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (i, pack_id) in packs.iter().enumerate() {
            if i > 0 {
                pause(self.delay).await;
            }

            let mut handle = self.gateway.asset(pack_id.clone());
            let sender = match handle.fetch_previous_owner().await {
                Ok(sender) => sender,
                Err(e) => {
                    warn!(asset_id = %pack_id, error = %e, "Sender lookup failed, pack skipped");
                    report.dropped.push((pack_id.clone(), e.to_string()));
                    continue;
                }
            };

            match handle.transfer(&self.minting_account, &self.memo).await {
                Ok(tx) => {
                    info!(asset_id = %pack_id, sender = %sender, tx_id = %tx, "Pack sent for opening");
                    report.senders.push(sender);
                    report.transferred.push(pack_id.clone());
                }
                Err(e) => {
                    error!(asset_id = %pack_id, error = %e, "Pack transfer failed");
                    report.dropped.push((pack_id.clone(), e.to_string()));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::MockIndexer;
    use crate::ledger::MockSubmitter;
    use std::sync::Arc;

    fn dispatcher(indexer: MockIndexer, submitter: Arc<MockSubmitter>) -> TransferDispatcher {
        spaced_dispatcher(indexer, submitter, Duration::ZERO)
    }

    fn spaced_dispatcher(
        indexer: MockIndexer,
        submitter: Arc<MockSubmitter>,
        delay: Duration,
    ) -> TransferDispatcher {
        TransferDispatcher::new(
            Gateway::new(Arc::new(indexer), submitter),
            AccountName::new("battleminers"),
            "pack_opening",
            delay,
        )
    }

    fn ids(v: &[&str]) -> Vec<AssetId> {
        v.iter().map(|s| AssetId::new(*s)).collect()
    }

    #[tokio::test]
    async fn records_sender_per_successful_transfer() {
        let indexer = MockIndexer::new()
            .with_owned_asset("p1", "op", "alice")
            .with_owned_asset("p2", "op", "bob");
        let submitter = Arc::new(MockSubmitter::new());

        let report = dispatcher(indexer, submitter.clone())
            .dispatch(&ids(&["p1", "p2"]))
            .await;

        assert_eq!(
            report.senders,
            vec![AccountName::new("alice"), AccountName::new("bob")]
        );
        let sent = submitter.submitted_named("transfer");
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0][0].data["to"], "battleminers");
        assert_eq!(sent[0][0].data["memo"], "pack_opening");
    }

    #[tokio::test]
    async fn failed_transfer_does_not_record_sender() {
        let indexer = MockIndexer::new()
            .with_owned_asset("p1", "op", "alice")
            .with_owned_asset("p2", "op", "bob");
        let submitter = Arc::new(MockSubmitter::new().with_failing_asset("p1"));

        let report = dispatcher(indexer, submitter)
            .dispatch(&ids(&["p1", "p2"]))
            .await;

        assert_eq!(report.senders, vec![AccountName::new("bob")]);
        assert_eq!(report.transferred, ids(&["p2"]));
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].0, AssetId::new("p1"));
    }

    #[tokio::test]
    async fn lookup_failure_drops_only_that_pack() {
        let indexer = MockIndexer::new()
            .with_owned_asset("p1", "op", "alice")
            .with_failing_asset("p1")
            .with_owned_asset("p2", "op", "bob");
        let submitter = Arc::new(MockSubmitter::new());

        let report = dispatcher(indexer, submitter.clone())
            .dispatch(&ids(&["p1", "p2"]))
            .await;

        assert_eq!(report.senders, vec![AccountName::new("bob")]);
        assert_eq!(submitter.submitted().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_between_packs_but_not_before_the_first() {
        let indexer = MockIndexer::new()
            .with_owned_asset("p1", "op", "alice")
            .with_owned_asset("p2", "op", "bob")
            .with_owned_asset("p3", "op", "carol");
        let submitter = Arc::new(MockSubmitter::new());
        let delay = Duration::from_millis(1500);

        let started = tokio::time::Instant::now();
        let report = spaced_dispatcher(indexer, submitter, delay)
            .dispatch(&ids(&["p1", "p2", "p3"]))
            .await;

        assert_eq!(report.transferred.len(), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= delay * 2 && elapsed < delay * 3, "slept {:?}", elapsed);
    }
}
