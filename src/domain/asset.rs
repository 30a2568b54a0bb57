//! Cached view of a single ledger asset.

use crate::domain::{AccountName, AssetId, Decimal, SaleId, TemplateId};
use serde::{Deserialize, Serialize};

/// A ledger asset as last observed through the indexer.
///
/// Fields are optional because a handle is often built from the id alone and
/// hydrated lazily. Nothing here owns ledger state: the `apply_*` methods are
/// called only after the matching ledger action was submitted successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub asset_id: AssetId,
    pub owner: Option<AccountName>,
    pub template_id: Option<TemplateId>,
    pub template_name: Option<String>,
    /// Listing price in WAX when on sale.
    pub price: Option<Decimal>,
    pub sale_id: Option<SaleId>,
    pub previous_owner: Option<AccountName>,
}

impl Asset {
    pub fn new(asset_id: AssetId) -> Self {
        Asset {
            asset_id,
            owner: None,
            template_id: None,
            template_name: None,
            price: None,
            sale_id: None,
            previous_owner: None,
        }
    }

    pub fn with_owner(mut self, owner: AccountName) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_template(mut self, template_id: TemplateId, name: Option<String>) -> Self {
        self.template_id = Some(template_id);
        self.template_name = name;
        self
    }

    pub fn with_sale(mut self, sale_id: SaleId, price: Decimal) -> Self {
        self.sale_id = Some(sale_id);
        self.price = Some(price);
        self
    }

    pub fn is_listed(&self) -> bool {
        self.sale_id.is_some()
    }

    /// Display label used in logs: template name when known, else the id.
    pub fn label(&self) -> &str {
        self.template_name
            .as_deref()
            .unwrap_or_else(|| self.asset_id.as_str())
    }

    pub fn apply_transfer(&mut self, recipient: AccountName) {
        self.previous_owner = self.owner.take();
        self.owner = Some(recipient);
        self.price = None;
        self.sale_id = None;
    }

    /// A fresh listing has no sale id until the indexer reports it.
    pub fn apply_listed(&mut self, price: Decimal) {
        self.price = Some(price);
        self.sale_id = None;
    }

    pub fn apply_cancelled(&mut self) {
        self.price = None;
        self.sale_id = None;
    }
}
