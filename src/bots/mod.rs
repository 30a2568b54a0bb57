//! Long-running market bots: per-asset undercutting and template buying.

use crate::domain::{AssetId, TemplateId};
use crate::engine::BelowMinimum;
use crate::indexer::IndexerError;
use crate::market::{AssetError, LookupError};
use thiserror::Error;

pub mod buyer;
pub mod store;
pub mod tracked;
pub mod undercut;

pub use buyer::{BuyerBot, BuyerSettings};
pub use store::{spawn_store, StoreHandle};
pub use tracked::{TrackedAsset, TrackedFile};
pub use undercut::{run_undercut_bots, UndercutBot, UndercutExit, UndercutPacing};

#[derive(Debug, Error)]
pub enum BotError {
    /// Business rule: the computed price would undercut the floor.
    #[error(transparent)]
    BelowMinimum(#[from] BelowMinimum),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("asset {0} has no template")]
    NoTemplate(AssetId),
    #[error("template {0} has no active listing")]
    NoListing(TemplateId),
    #[error("stopped after {errors} consecutive errors, last: {last}")]
    TooManyErrors { errors: u32, last: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BotError {
    pub fn is_transient(&self) -> bool {
        match self {
            BotError::Asset(e) => e.is_transient(),
            BotError::NoListing(_) => true,
            BotError::BelowMinimum(_)
            | BotError::NoTemplate(_)
            | BotError::TooManyErrors { .. }
            | BotError::Store(_) => false,
        }
    }
}

impl From<IndexerError> for BotError {
    fn from(err: IndexerError) -> Self {
        BotError::Asset(err.into())
    }
}

impl From<LookupError> for BotError {
    fn from(err: LookupError) -> Self {
        BotError::Asset(err.into())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tracked file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("tracked file is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tracked store has shut down")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decimal;
    use crate::ledger::SubmitError;

    #[test]
    fn stale_sale_is_transient_but_floor_is_not() {
        let stale: BotError = AssetError::Submit(SubmitError::StaleReference("gone".into())).into();
        assert!(stale.is_transient());

        let floor: BotError = BelowMinimum {
            candidate: Decimal::zero(),
            min_price: Decimal::zero(),
        }
        .into();
        assert!(!floor.is_transient());

        let net: BotError = IndexerError::RateLimited.into();
        assert!(net.is_transient());
    }
}
