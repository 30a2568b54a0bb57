//! Transfer records and marketplace listings as reported by the indexer.

use crate::domain::{AccountName, AssetId, Decimal, SaleId, TimeMs};
use serde::{Deserialize, Serialize};

/// The most recent movement of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub sender: AccountName,
    pub recipient: AccountName,
    pub memo: String,
    pub created_at: TimeMs,
}

impl TransferRecord {
    pub fn new(sender: AccountName, recipient: AccountName) -> Self {
        TransferRecord {
            sender,
            recipient,
            memo: String::new(),
            created_at: TimeMs::default(),
        }
    }

    pub fn with_created_at(mut self, created_at: TimeMs) -> Self {
        self.created_at = created_at;
        self
    }

    /// The indexer lags behind the chain; a transfer whose recipient is not
    /// the asset's current owner describes an older state and must be ignored.
    pub fn confirms_owner(&self, owner: &AccountName) -> bool {
        &self.recipient == owner
    }
}

/// An active marketplace sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub asset_id: AssetId,
    pub sale_id: SaleId,
    pub seller: AccountName,
    pub price: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirms_owner_only_for_matching_recipient() {
        let record = TransferRecord::new(AccountName::new("battleminers"), AccountName::new("op"));
        assert!(record.confirms_owner(&AccountName::new("op")));
        assert!(!record.confirms_owner(&AccountName::new("someone.else")));
    }
}
