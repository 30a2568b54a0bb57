//! Asset and account operations compiled to ledger actions.

use crate::domain::{AccountName, AssetId};
use crate::indexer::{Indexer, IndexerError};
use crate::ledger::{ActionSubmitter, SubmitError};
use std::sync::Arc;
use thiserror::Error;

pub mod account;
pub mod asset;

pub use account::OperatorAccount;
pub use asset::AssetHandle;

/// The two external collaborators every ledger operation needs.
#[derive(Debug, Clone)]
pub struct Gateway {
    pub indexer: Arc<dyn Indexer>,
    pub submitter: Arc<dyn ActionSubmitter>,
}

impl Gateway {
    pub fn new(indexer: Arc<dyn Indexer>, submitter: Arc<dyn ActionSubmitter>) -> Self {
        Self { indexer, submitter }
    }

    pub fn asset(&self, asset_id: AssetId) -> AssetHandle {
        AssetHandle::new(asset_id, self.clone())
    }

    pub fn account(&self, name: AccountName) -> OperatorAccount {
        OperatorAccount::new(name, self.clone())
    }
}

/// An expected indexer record is missing or not yet consistent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error(transparent)]
    Indexer(#[from] IndexerError),
    #[error("asset {0} has no owner")]
    NoOwner(AssetId),
    #[error("asset {0} has no recorded transfer")]
    MissingTransfer(AssetId),
    #[error("last transfer of asset {asset_id} went to {recipient}, but the owner is {owner}")]
    StaleTransfer {
        asset_id: AssetId,
        recipient: AccountName,
        owner: AccountName,
    },
    #[error("asset {0} is not listed for sale")]
    NoSale(AssetId),
}

impl LookupError {
    /// Lag-induced failures that may resolve by asking again later.
    pub fn is_transient(&self) -> bool {
        match self {
            LookupError::Indexer(e) => e.is_transient(),
            LookupError::StaleTransfer { .. } | LookupError::MissingTransfer(_) => true,
            LookupError::NoOwner(_) | LookupError::NoSale(_) => false,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssetError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
}

impl AssetError {
    pub fn is_transient(&self) -> bool {
        match self {
            AssetError::Lookup(e) => e.is_transient(),
            AssetError::Submit(e) => e.is_transient(),
        }
    }
}

impl From<IndexerError> for AssetError {
    fn from(err: IndexerError) -> Self {
        AssetError::Lookup(LookupError::Indexer(err))
    }
}
