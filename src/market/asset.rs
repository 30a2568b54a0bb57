//! Lookups and mutating operations on a single asset.

use super::{AssetError, Gateway, LookupError};
use crate::domain::{AccountName, Asset, AssetId, Decimal, Listing, TxId};
use crate::ledger::actions;
use tracing::info;

/// An [`Asset`] view bound to the indexer and the submitter.
///
/// The cached view is updated only after the ledger accepted the action.
#[derive(Debug, Clone)]
pub struct AssetHandle {
    asset: Asset,
    gateway: Gateway,
}

impl AssetHandle {
    pub fn new(asset_id: AssetId, gateway: Gateway) -> Self {
        Self::from_asset(Asset::new(asset_id), gateway)
    }

    pub fn from_asset(asset: Asset, gateway: Gateway) -> Self {
        Self { asset, gateway }
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    pub fn id(&self) -> &AssetId {
        &self.asset.asset_id
    }

    pub fn into_asset(self) -> Asset {
        self.asset
    }

    /// Owner, fetched on first use.
    pub async fn fetch_owner(&mut self) -> Result<AccountName, LookupError> {
        if let Some(owner) = &self.asset.owner {
            return Ok(owner.clone());
        }

        let fetched = self.gateway.indexer.fetch_asset(&self.asset.asset_id).await?;
        let owner = fetched
            .owner
            .ok_or_else(|| LookupError::NoOwner(self.asset.asset_id.clone()))?;
        self.asset.owner = Some(owner.clone());
        Ok(owner)
    }

    /// Re-read owner, template, sale and previous owner from the indexer.
    pub async fn refresh(&mut self) -> Result<&Asset, LookupError> {
        let fetched = self.gateway.indexer.fetch_asset(&self.asset.asset_id).await?;
        self.asset.owner = fetched.owner.or(self.asset.owner.take());
        if fetched.template_id.is_some() {
            self.asset.template_id = fetched.template_id;
            self.asset.template_name = fetched.template_name;
        }

        self.fetch_market_details().await?;
        match self.fetch_previous_owner().await {
            // Assets that never moved since minting have no transfer history.
            Ok(_) | Err(LookupError::MissingTransfer(_)) => {}
            Err(e) => return Err(e),
        }

        Ok(&self.asset)
    }

    /// Current sale, if listed. Updates the cached price and sale id.
    pub async fn fetch_market_details(&mut self) -> Result<Option<Listing>, LookupError> {
        let sale = self
            .gateway
            .indexer
            .fetch_active_sale(&self.asset.asset_id)
            .await?;
        match &sale {
            Some(listing) => {
                self.asset.price = Some(listing.price);
                self.asset.sale_id = Some(listing.sale_id.clone());
            }
            None => self.asset.apply_cancelled(),
        }
        Ok(sale)
    }

    /// Sender of the most recent transfer, accepted only when that transfer
    /// delivered the asset to its current owner.
    pub async fn fetch_previous_owner(&mut self) -> Result<AccountName, LookupError> {
        let owner = self.fetch_owner().await?;
        let transfer = self
            .gateway
            .indexer
            .fetch_last_transfer(&self.asset.asset_id)
            .await?
            .ok_or_else(|| LookupError::MissingTransfer(self.asset.asset_id.clone()))?;

        if !transfer.confirms_owner(&owner) {
            return Err(LookupError::StaleTransfer {
                asset_id: self.asset.asset_id.clone(),
                recipient: transfer.recipient,
                owner,
            });
        }

        self.asset.previous_owner = Some(transfer.sender.clone());
        Ok(transfer.sender)
    }

    pub async fn transfer(
        &mut self,
        recipient: &AccountName,
        memo: &str,
    ) -> Result<TxId, AssetError> {
        let owner = self.fetch_owner().await?;
        let action = actions::transfer_assets(
            &owner,
            recipient,
            std::slice::from_ref(&self.asset.asset_id),
            memo,
        );
        let tx = self.gateway.submitter.submit(&[action]).await?;

        self.asset.apply_transfer(recipient.clone());
        info!(asset_id = %self.asset.asset_id, recipient = %recipient, "Asset transferred");
        Ok(tx)
    }

    /// List the asset on the market at `price`.
    pub async fn sell(&mut self, price: Decimal) -> Result<TxId, AssetError> {
        let owner = self.fetch_owner().await?;
        let batch = [
            actions::announce_sale(&owner, &self.asset.asset_id, price),
            actions::create_sale_offer(&owner, &self.asset.asset_id),
        ];
        let tx = self.gateway.submitter.submit(&batch).await?;

        self.asset.apply_listed(price);
        info!(asset_id = %self.asset.asset_id, price = %price, "Asset listed for sale");
        Ok(tx)
    }

    pub async fn cancel_sale(&mut self) -> Result<TxId, AssetError> {
        let owner = self.fetch_owner().await?;
        if self.asset.sale_id.is_none() {
            self.fetch_market_details().await?;
        }
        let sale_id = self
            .asset
            .sale_id
            .clone()
            .ok_or_else(|| LookupError::NoSale(self.asset.asset_id.clone()))?;

        let tx = self
            .gateway
            .submitter
            .submit(&[actions::cancel_sale(&owner, &sale_id)])
            .await?;

        self.asset.apply_cancelled();
        info!(asset_id = %self.asset.asset_id, sale_id = %sale_id, "Sale cancelled");
        Ok(tx)
    }

    /// Cancel the current sale and relist at `new_price` in one transaction.
    pub async fn update_offer(&mut self, new_price: Decimal) -> Result<TxId, AssetError> {
        let owner = self.fetch_owner().await?;
        if self.asset.sale_id.is_none() || self.asset.price.is_none() {
            self.fetch_market_details().await?;
        }
        let sale_id = self
            .asset
            .sale_id
            .clone()
            .ok_or_else(|| LookupError::NoSale(self.asset.asset_id.clone()))?;
        let old_price = self.asset.price;

        let batch = [
            actions::cancel_sale(&owner, &sale_id),
            actions::announce_sale(&owner, &self.asset.asset_id, new_price),
            actions::create_sale_offer(&owner, &self.asset.asset_id),
        ];
        let tx = self.gateway.submitter.submit(&batch).await?;

        self.asset.apply_listed(new_price);
        info!(
            asset_id = %self.asset.asset_id,
            old_price = ?old_price.map(|p| p.to_string()),
            new_price = %new_price,
            "Price updated"
        );
        Ok(tx)
    }

    /// Buy the asset's current sale on behalf of `buyer`.
    pub async fn buy(&mut self, buyer: &AccountName) -> Result<TxId, AssetError> {
        if self.asset.sale_id.is_none() || self.asset.price.is_none() {
            self.fetch_market_details().await?;
        }
        let (sale_id, price) = match (&self.asset.sale_id, self.asset.price) {
            (Some(sale_id), Some(price)) => (sale_id.clone(), price),
            _ => return Err(LookupError::NoSale(self.asset.asset_id.clone()).into()),
        };

        let batch = actions::buy_listing(buyer, &self.asset.asset_id, &sale_id, price);
        let tx = self.gateway.submitter.submit(&batch).await?;

        self.asset.apply_transfer(buyer.clone());
        info!(asset_id = %self.asset.asset_id, price = %price, "Asset bought");
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SaleId, TemplateId, TransferRecord};
    use crate::indexer::MockIndexer;
    use crate::ledger::{MockSubmitter, SubmitError};
    use std::str::FromStr;
    use std::sync::Arc;

    fn price(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn listing(asset: &str, sale: &str, seller: &str, px: &str) -> Listing {
        Listing {
            asset_id: AssetId::new(asset),
            sale_id: SaleId::new(sale),
            seller: AccountName::new(seller),
            price: price(px),
        }
    }

    fn gateway(indexer: MockIndexer, submitter: Arc<MockSubmitter>) -> Gateway {
        Gateway::new(Arc::new(indexer), submitter)
    }

    #[tokio::test]
    async fn previous_owner_requires_consistent_transfer() {
        let indexer = MockIndexer::new()
            .with_asset(Asset::new(AssetId::new("1")).with_owner(AccountName::new("op")))
            .with_transfer(
                AssetId::new("1"),
                TransferRecord::new(AccountName::new("alice"), AccountName::new("bob")),
            );
        let gw = gateway(indexer, Arc::new(MockSubmitter::new()));

        let err = gw
            .asset(AssetId::new("1"))
            .fetch_previous_owner()
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::StaleTransfer { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn refresh_hydrates_every_field() {
        let indexer = MockIndexer::new()
            .with_asset(
                Asset::new(AssetId::new("1"))
                    .with_owner(AccountName::new("op"))
                    .with_template(TemplateId::new("260676"), Some("Farmer Coin".into())),
            )
            .with_transfer(
                AssetId::new("1"),
                TransferRecord::new(AccountName::new("5wme4.wam"), AccountName::new("op")),
            )
            .with_sale(listing("1", "31", "op", "2.5"));
        let gw = gateway(indexer, Arc::new(MockSubmitter::new()));

        let mut handle = gw.asset(AssetId::new("1"));
        let asset = handle.refresh().await.unwrap();
        assert_eq!(asset.template_name.as_deref(), Some("Farmer Coin"));
        assert_eq!(asset.previous_owner, Some(AccountName::new("5wme4.wam")));
        assert_eq!(asset.sale_id, Some(SaleId::new("31")));
        assert_eq!(asset.price, Some(price("2.5")));
    }

    #[tokio::test]
    async fn transfer_updates_owner_after_submission() {
        let submitter = Arc::new(MockSubmitter::new());
        let indexer = MockIndexer::new()
            .with_asset(Asset::new(AssetId::new("1")).with_owner(AccountName::new("op")));
        let gw = gateway(indexer, submitter.clone());

        let mut handle = gw.asset(AssetId::new("1"));
        handle
            .transfer(&AccountName::new("battleminers"), "pack_opening")
            .await
            .unwrap();

        assert_eq!(handle.asset().owner, Some(AccountName::new("battleminers")));
        let sent = submitter.submitted();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][0].data["memo"], "pack_opening");
        assert_eq!(sent[0][0].data["from"], "op");
    }

    #[tokio::test]
    async fn failed_transfer_leaves_view_untouched() {
        let submitter = Arc::new(MockSubmitter::new().with_failing_asset("1"));
        let indexer = MockIndexer::new()
            .with_asset(Asset::new(AssetId::new("1")).with_owner(AccountName::new("op")));
        let gw = gateway(indexer, submitter);

        let mut handle = gw.asset(AssetId::new("1"));
        let err = handle
            .transfer(&AccountName::new("battleminers"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::Submit(SubmitError::Rejected(_))));
        assert_eq!(handle.asset().owner, Some(AccountName::new("op")));
    }

    #[tokio::test]
    async fn update_offer_cancels_then_relists() {
        let submitter = Arc::new(MockSubmitter::new());
        let indexer = MockIndexer::new()
            .with_asset(Asset::new(AssetId::new("1")).with_owner(AccountName::new("op")))
            .with_sale(listing("1", "31", "op", "10"));
        let gw = gateway(indexer, submitter.clone());

        let mut handle = gw.asset(AssetId::new("1"));
        handle.update_offer(price("9")).await.unwrap();

        let tx = &submitter.submitted()[0];
        let names: Vec<_> = tx.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["cancelsale", "announcesale", "createoffer"]);
        assert_eq!(tx[0].data["sale_id"], "31");
        assert_eq!(handle.asset().price, Some(price("9")));
        assert!(handle.asset().sale_id.is_none());
    }

    #[tokio::test]
    async fn cancel_without_sale_is_lookup_error() {
        let indexer = MockIndexer::new()
            .with_asset(Asset::new(AssetId::new("1")).with_owner(AccountName::new("op")));
        let gw = gateway(indexer, Arc::new(MockSubmitter::new()));

        let err = gw.asset(AssetId::new("1")).cancel_sale().await.unwrap_err();
        assert!(matches!(err, AssetError::Lookup(LookupError::NoSale(_))));
    }

    #[tokio::test]
    async fn buy_submits_three_actions() {
        let submitter = Arc::new(MockSubmitter::new());
        let indexer = MockIndexer::new().with_sale(listing("8", "44", "seller", "14"));
        let gw = gateway(indexer, submitter.clone());

        let mut handle = gw.asset(AssetId::new("8"));
        handle.buy(&AccountName::new("lean4lan.gm")).await.unwrap();

        assert_eq!(submitter.submitted()[0].len(), 3);
        assert_eq!(handle.asset().owner, Some(AccountName::new("lean4lan.gm")));
    }
}
