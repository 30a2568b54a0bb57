//! Account-level operations of the operator.

use super::Gateway;
use crate::domain::{AccountName, AssetId, Decimal, TxId};
use crate::indexer::IndexerError;
use crate::ledger::{actions, SubmitError};
use tracing::info;

#[derive(Debug, Clone)]
pub struct OperatorAccount {
    name: AccountName,
    gateway: Gateway,
}

impl OperatorAccount {
    pub fn new(name: AccountName, gateway: Gateway) -> Self {
        Self { name, gateway }
    }

    pub fn name(&self) -> &AccountName {
        &self.name
    }

    /// Move every asset in `asset_ids` to `recipient` in one action.
    pub async fn bulk_transfer(
        &self,
        recipient: &AccountName,
        asset_ids: &[AssetId],
        memo: &str,
    ) -> Result<TxId, SubmitError> {
        let action = actions::transfer_assets(&self.name, recipient, asset_ids, memo);
        let tx = self.gateway.submitter.submit(&[action]).await?;
        info!(
            count = asset_ids.len(),
            from = %self.name,
            recipient = %recipient,
            tx_id = %tx,
            "Assets transferred"
        );
        Ok(tx)
    }

    pub async fn balance(&self) -> Result<Decimal, IndexerError> {
        self.gateway.indexer.fetch_balance(&self.name).await
    }
}
