//! Keeping only the actives minted for this cycle's packs.

use super::pause;
use crate::domain::{AccountName, AssetId, MatchedActives, TimeMs};
use crate::engine::{classify, Provenance};
use crate::market::{Gateway, LookupError};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SourceMatcher {
    gateway: Gateway,
    minting_account: AccountName,
    minted_after: TimeMs,
    delay: Duration,
}

impl SourceMatcher {
    pub fn new(gateway: Gateway, minting_account: AccountName, delay: Duration) -> Self {
        Self {
            gateway,
            minting_account,
            minted_after: TimeMs::default(),
            delay,
        }
    }

    /// Ignore deliveries from the minting account older than `since`.
    pub fn minted_after(mut self, since: TimeMs) -> Self {
        self.minted_after = since;
        self
    }

    /// Ordered, duplicate-free subset of `observed` delivered by the minting
    /// account since the cycle dispatched its packs.
    pub async fn match_actives(&self, observed: &[AssetId]) -> MatchedActives {
        let mut matched = MatchedActives::new();

        for (i, asset_id) in observed.iter().enumerate() {
            if matched.contains(asset_id) {
                debug!(asset_id = %asset_id, "Duplicate observation skipped");
                continue;
            }
            if i > 0 {
                pause(self.delay).await;
            }

            match self.provenance(asset_id).await {
                Ok(Provenance::FreshMint) => {
                    matched.insert(asset_id.clone());
                }
                Ok(Provenance::PreExisting { sender }) if sender == self.minting_account => {
                    info!(asset_id = %asset_id, "Minted by an earlier cycle, left in place");
                }
                Ok(Provenance::PreExisting { sender }) => {
                    debug!(asset_id = %asset_id, sender = %sender, "Not minted by this cycle");
                }
                Ok(Provenance::StaleIndex { recipient }) => {
                    warn!(asset_id = %asset_id, recipient = %recipient, "Transfer history lags ownership, skipped");
                }
                Err(e) => warn!(asset_id = %asset_id, error = %e, "Provenance lookup failed, skipped"),
            }
        }

        info!(
            observed = observed.len(),
            matched = matched.len(),
            "Attributed actives"
        );
        matched
    }

    async fn provenance(&self, asset_id: &AssetId) -> Result<Provenance, LookupError> {
        let owner = self.gateway.asset(asset_id.clone()).fetch_owner().await?;
        let last = self
            .gateway
            .indexer
            .fetch_last_transfer(asset_id)
            .await?
            .ok_or_else(|| LookupError::MissingTransfer(asset_id.clone()))?;
        Ok(classify(
            &owner,
            &last,
            &self.minting_account,
            self.minted_after,
        ))
    }
}
