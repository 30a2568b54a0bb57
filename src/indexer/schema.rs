//! Response schemas of the AtomicAssets / AtomicMarket indexer and the chain
//! state API.
//!
//! Required fields are non-optional so that a malformed response fails to
//! decode instead of surfacing later as a missing value.

use super::IndexerError;
use crate::domain::{
    AccountName, Asset, AssetId, Decimal, Listing, SaleId, TemplateId, TimeMs, TransferRecord,
    WAX_PRECISION,
};
use serde::Deserialize;

/// `{"success": true, "data": ...}` wrapper used by every indexer endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> Result<T, IndexerError> {
        if !self.success {
            return Err(IndexerError::ParseError(
                "indexer reported success=false".to_string(),
            ));
        }
        Ok(self.data)
    }
}

#[derive(Debug, Deserialize)]
pub struct RawAsset {
    pub asset_id: String,
    pub owner: Option<String>,
    #[serde(default)]
    pub template: Option<RawTemplate>,
}

#[derive(Debug, Deserialize)]
pub struct RawTemplate {
    pub template_id: String,
    #[serde(default)]
    pub immutable_data: RawImmutableData,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawImmutableData {
    pub name: Option<String>,
}

impl RawAsset {
    pub fn into_asset(self) -> Asset {
        let mut asset = Asset::new(AssetId::new(self.asset_id));
        // Burned assets have no owner.
        asset.owner = self.owner.map(AccountName::new);
        if let Some(template) = self.template {
            asset = asset.with_template(
                TemplateId::new(template.template_id),
                template.immutable_data.name,
            );
        }
        asset
    }
}

#[derive(Debug, Deserialize)]
pub struct RawTransfer {
    pub sender_name: String,
    pub recipient_name: String,
    #[serde(default)]
    pub memo: String,
    pub created_at_time: String,
}

impl RawTransfer {
    pub fn into_record(self) -> Result<TransferRecord, IndexerError> {
        let created_at = self.created_at_time.parse::<i64>().map_err(|_| {
            IndexerError::ParseError(format!(
                "invalid created_at_time: {}",
                self.created_at_time
            ))
        })?;
        Ok(TransferRecord {
            sender: AccountName::new(self.sender_name),
            recipient: AccountName::new(self.recipient_name),
            memo: self.memo,
            created_at: TimeMs::new(created_at),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RawSale {
    pub sale_id: String,
    pub seller: String,
    pub listing_price: String,
    #[serde(default)]
    pub price: Option<RawPrice>,
    #[serde(default)]
    pub assets: Vec<RawSaleAsset>,
}

#[derive(Debug, Deserialize)]
pub struct RawPrice {
    pub token_precision: u32,
}

#[derive(Debug, Deserialize)]
pub struct RawSaleAsset {
    pub asset_id: String,
}

impl RawSale {
    /// `fallback_asset` is used when the sale payload omits its asset list.
    pub fn into_listing(self, fallback_asset: Option<&AssetId>) -> Result<Listing, IndexerError> {
        let precision = self
            .price
            .as_ref()
            .map(|p| p.token_precision)
            .unwrap_or(WAX_PRECISION);
        let price = Decimal::from_base_units(&self.listing_price, precision)
            .map_err(|e| IndexerError::ParseError(format!("invalid listing_price: {}", e)))?;

        let asset_id = match self.assets.into_iter().next() {
            Some(raw) => AssetId::new(raw.asset_id),
            None => fallback_asset.cloned().ok_or_else(|| {
                IndexerError::ParseError(format!("sale {} has no assets", self.sale_id))
            })?,
        };

        Ok(Listing {
            asset_id,
            sale_id: SaleId::new(self.sale_id),
            seller: AccountName::new(self.seller),
            price,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AccountStateResponse {
    pub account: RawAccount,
}

#[derive(Debug, Deserialize)]
pub struct RawAccount {
    /// e.g. "152.34000000 WAX"; absent for accounts without liquid balance.
    pub core_liquid_balance: Option<String>,
}

impl RawAccount {
    pub fn liquid_balance(&self) -> Result<Decimal, IndexerError> {
        match &self.core_liquid_balance {
            Some(quantity) => Decimal::from_quantity(quantity)
                .map_err(|e| IndexerError::ParseError(e.to_string())),
            None => Ok(Decimal::zero()),
        }
    }
}
