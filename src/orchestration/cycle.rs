//! One reconciliation cycle end to end, and the loop that repeats it.

use super::{
    pause, ConvergencePoller, FailedBatch, PackCollector, ReturnExecutor, SourceMatcher,
    TransferDispatcher,
};
use crate::config::Config;
use crate::db::Repository;
use crate::domain::{AccountName, AssetId, CycleState, DisplayMode, PollOutcome, TimeMs};
use crate::engine::{group_transactions, GroupingError};
use crate::indexer::{AssetFilter, IndexerError};
use crate::market::Gateway;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Accounts, filters and pacing of the pack-opening loop.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub operator: AccountName,
    pub minting_account: AccountName,
    pub pack_filters: Vec<AssetFilter>,
    pub active_filter: AssetFilter,
    pub open_memo: String,
    pub rate_limit: Duration,
    pub match_delay: Duration,
    pub return_delay: Duration,
    pub mint_wait: Duration,
    pub mint_clock_skew: Duration,
    pub max_poll_attempts: u32,
    pub group_size: usize,
    pub return_retry_attempts: u32,
    pub display: DisplayMode,
}

impl From<&Config> for CycleSettings {
    fn from(config: &Config) -> Self {
        CycleSettings {
            operator: config.operator_account.clone(),
            minting_account: config.minting_account.clone(),
            pack_filters: config
                .pack_template_ids
                .iter()
                .cloned()
                .map(AssetFilter::Template)
                .collect(),
            active_filter: AssetFilter::Category(config.active_category.clone()),
            open_memo: config.open_memo.clone(),
            rate_limit: config.rate_limit,
            match_delay: config.match_delay,
            return_delay: config.return_delay,
            mint_wait: config.mint_wait,
            mint_clock_skew: config.mint_clock_skew,
            max_poll_attempts: config.max_poll_attempts,
            group_size: config.group_size,
            return_retry_attempts: config.return_retry_attempts,
            display: config.display_mode,
        }
    }
}

/// Summary of one cycle, journaled when it ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: TimeMs,
    pub packs_found: usize,
    pub senders: Vec<AccountName>,
    pub actives_observed: usize,
    pub matched: Vec<AssetId>,
    pub poll: Option<PollOutcome>,
    pub batches_submitted: usize,
    pub assets_returned: usize,
    pub failed: Vec<FailedBatch>,
}

impl CycleReport {
    fn from_state(state: &CycleState, started_at: TimeMs) -> Self {
        CycleReport {
            cycle_id: state.cycle_id,
            started_at,
            packs_found: state.packs.len(),
            senders: state.senders.clone(),
            actives_observed: state.observed_actives.len(),
            matched: state.matched.as_slice().to_vec(),
            poll: state.poll,
            batches_submitted: 0,
            assets_returned: 0,
            failed: Vec::new(),
        }
    }

    /// Nothing was found to open.
    pub fn is_idle(&self) -> bool {
        self.packs_found == 0
    }

    pub fn status(&self) -> &'static str {
        if self.failed.is_empty() {
            "completed"
        } else {
            "partial"
        }
    }
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("pack collection failed: {0}")]
    Collection(#[source] IndexerError),
    #[error("cycle {cycle_id} not returned: {source}")]
    Grouping {
        cycle_id: Uuid,
        #[source]
        source: GroupingError,
    },
    #[error(transparent)]
    Journal(#[from] sqlx::Error),
}

impl CycleError {
    pub fn stage(&self) -> &'static str {
        match self {
            CycleError::Collection(_) => "collection",
            CycleError::Grouping { .. } => "grouping",
            CycleError::Journal(_) => "journal",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub resolved: usize,
    pub assets_resubmitted: usize,
    pub still_failing: usize,
}

/// Runs reconciliation cycles for one operator account.
#[derive(Debug, Clone)]
pub struct PackOpener {
    settings: CycleSettings,
    gateway: Gateway,
    journal: Option<Arc<Repository>>,
}

impl PackOpener {
    pub fn new(settings: CycleSettings, gateway: Gateway) -> Self {
        Self {
            settings,
            gateway,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: Arc<Repository>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    fn collector(&self) -> PackCollector {
        PackCollector::new(
            self.gateway.indexer.clone(),
            self.settings.operator.clone(),
            self.settings.pack_filters.clone(),
        )
        .with_display_mode(self.settings.display)
    }

    /// Discover, dispatch, wait, attribute, group and return once.
    ///
    /// An idle report (no packs found) is returned without touching the ledger.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let started_at = TimeMs::now();
        let collector = self.collector();

        let first = collector.collect().await.map_err(CycleError::Collection)?;
        if first.is_empty() {
            return Ok(CycleReport::from_state(&CycleState::new(first), started_at));
        }

        // Packs often arrive in bursts; give the rest of the burst one delay.
        pause(self.settings.rate_limit).await;
        let packs = match collector.collect().await {
            Ok(again) if !again.is_empty() => again,
            Ok(_) => first,
            Err(e) => {
                warn!(error = %e, "Re-collection failed, using first pass");
                first
            }
        };

        let mut state = CycleState::new(packs);
        info!(cycle_id = %state.cycle_id, packs = state.packs.len(), "Cycle started");

        let dispatch = TransferDispatcher::new(
            self.gateway.clone(),
            self.settings.minting_account.clone(),
            self.settings.open_memo.clone(),
            self.settings.rate_limit,
        )
        .dispatch(&state.packs)
        .await;
        state.senders = dispatch.senders;

        if state.senders.is_empty() {
            warn!(cycle_id = %state.cycle_id, "No pack was transferred");
            let report = CycleReport::from_state(&state, started_at);
            self.journal_report(&report).await;
            return Ok(report);
        }

        pause(self.settings.mint_wait).await;
        let poll = ConvergencePoller::new(
            self.gateway.indexer.clone(),
            self.settings.operator.clone(),
            self.settings.active_filter.clone(),
            self.settings.max_poll_attempts,
            self.settings.rate_limit,
        )
        .poll(state.expected_actives())
        .await;
        state.poll = Some(poll.outcome);
        state.observed_actives = poll.actives;

        state.matched = SourceMatcher::new(
            self.gateway.clone(),
            self.settings.minting_account.clone(),
            self.settings.match_delay,
        )
        .minted_after(self.mint_cutoff(&state))
        .match_actives(&state.observed_actives)
        .await;

        let group = match group_transactions(
            state.matched.as_slice(),
            &state.senders,
            self.settings.group_size,
        ) {
            Ok(group) => group,
            Err(source) => {
                error!(
                    cycle_id = %state.cycle_id,
                    matched = state.matched.len(),
                    senders = state.senders.len(),
                    error = %source,
                    "Cannot pair actives with senders, nothing returned"
                );
                let err = CycleError::Grouping {
                    cycle_id: state.cycle_id,
                    source,
                };
                self.journal_failure(state.cycle_id, &err).await;
                return Err(err);
            }
        };

        let returned = ReturnExecutor::new(
            self.gateway.account(self.settings.operator.clone()),
            self.settings.return_delay,
        )
        .with_retry_attempts(self.settings.return_retry_attempts)
        .execute(group)
        .await;

        let mut report = CycleReport::from_state(&state, started_at);
        report.batches_submitted = returned.submitted.len();
        report.assets_returned = returned.assets_returned();
        report.failed = returned.failed;

        info!(
            cycle_id = %report.cycle_id,
            returned = report.assets_returned,
            batches = report.batches_submitted,
            failed = report.failed.len(),
            "Cycle finished"
        );
        self.journal_report(&report).await;
        Ok(report)
    }

    /// Earliest block time an active of this cycle can carry.
    fn mint_cutoff(&self, state: &CycleState) -> TimeMs {
        let skew = i64::try_from(self.settings.mint_clock_skew.as_millis()).unwrap_or(i64::MAX);
        TimeMs::new(state.started_at.as_ms().saturating_sub(skew))
    }

    /// Replay journaled failures once, then run cycles until the process ends.
    pub async fn run_forever(&self) {
        match self.replay_failed_returns().await {
            Ok(r) if r != ReplayReport::default() => info!(
                resolved = r.resolved,
                resubmitted = r.assets_resubmitted,
                still_failing = r.still_failing,
                "Replayed failed returns"
            ),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Replay of failed returns failed"),
        }

        loop {
            match self.run_cycle().await {
                Ok(report) if report.is_idle() => pause(self.settings.rate_limit).await,
                Ok(_) => {}
                Err(e) => {
                    error!(stage = e.stage(), error = %e, "Cycle failed");
                    if let CycleError::Collection(_) = e {
                        self.journal_failure(Uuid::new_v4(), &e).await;
                    }
                    pause(self.settings.rate_limit).await;
                }
            }
        }
    }

    /// Resubmit every unresolved journaled batch, restricted to assets the
    /// operator still owns. A batch is resolved once nothing of it remains.
    pub async fn replay_failed_returns(&self) -> Result<ReplayReport, CycleError> {
        let journal = match &self.journal {
            Some(journal) => journal,
            None => return Ok(ReplayReport::default()),
        };

        let mut report = ReplayReport::default();
        let account = self.gateway.account(self.settings.operator.clone());

        'batches: for failed in journal.unresolved_failed_batches().await? {
            let fingerprint = failed.fingerprint();
            let mut still_owned = Vec::new();

            for asset_id in &failed.batch.asset_ids {
                match self.gateway.indexer.fetch_asset(asset_id).await {
                    Ok(asset) if asset.owner.as_ref() == Some(&self.settings.operator) => {
                        still_owned.push(asset_id.clone());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(asset_id = %asset_id, error = %e, "Owner unknown, batch kept for later");
                        report.still_failing += 1;
                        continue 'batches;
                    }
                }
            }

            if !still_owned.is_empty() {
                match account
                    .bulk_transfer(&failed.batch.recipient, &still_owned, "")
                    .await
                {
                    Ok(_) => report.assets_resubmitted += still_owned.len(),
                    Err(e) => {
                        warn!(recipient = %failed.batch.recipient, error = %e, "Replay rejected");
                        report.still_failing += 1;
                        continue;
                    }
                }
            }

            journal.mark_batch_resolved(&fingerprint).await?;
            report.resolved += 1;
        }

        Ok(report)
    }

    async fn journal_report(&self, report: &CycleReport) {
        let Some(journal) = &self.journal else {
            return;
        };
        if let Err(e) = journal.record_cycle(report).await {
            error!(cycle_id = %report.cycle_id, error = %e, "Journal write failed");
        }
        for failed in &report.failed {
            if let Err(e) = journal.record_failed_batch(report.cycle_id, failed).await {
                error!(
                    cycle_id = %report.cycle_id,
                    recipient = %failed.batch.recipient,
                    assets = ?failed.batch.asset_ids,
                    error = %e,
                    "Failed batch could not be journaled"
                );
            }
        }
    }

    async fn journal_failure(&self, cycle_id: Uuid, err: &CycleError) {
        let Some(journal) = &self.journal else {
            return;
        };
        if let Err(e) = journal
            .record_cycle_failure(cycle_id, err.stage(), &err.to_string())
            .await
        {
            error!(cycle_id = %cycle_id, error = %e, "Journal write failed");
        }
    }
}
