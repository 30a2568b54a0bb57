//! Indexer abstraction for reading asset ownership, transfers and market state.

use crate::domain::{AccountName, Asset, AssetId, Decimal, Listing, TemplateId, TransferRecord};
use async_trait::async_trait;
use std::fmt;

pub mod atomic;
pub mod mock;
pub mod schema;

pub use atomic::AtomicIndexer;
pub use mock::MockIndexer;

/// Ownership query filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetFilter {
    /// Assets minted from one template.
    Template(TemplateId),
    /// Assets of one schema (category), e.g. "active".
    Category(String),
}

impl fmt::Display for AssetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetFilter::Template(id) => write!(f, "template:{}", id),
            AssetFilter::Category(name) => write!(f, "category:{}", name),
        }
    }
}

/// Read-only view of ledger state.
///
/// Implementations must handle pagination and retry/backoff; every answer may
/// lag the chain.
#[async_trait]
pub trait Indexer: Send + Sync + fmt::Debug {
    /// Asset ids owned by `owner` matching `filter`, newest first.
    async fn list_owned(
        &self,
        owner: &AccountName,
        filter: &AssetFilter,
    ) -> Result<Vec<AssetId>, IndexerError>;

    /// Owner and template details of one asset.
    async fn fetch_asset(&self, asset_id: &AssetId) -> Result<Asset, IndexerError>;

    /// Most recent transfer of an asset, if the indexer knows of any.
    async fn fetch_last_transfer(
        &self,
        asset_id: &AssetId,
    ) -> Result<Option<TransferRecord>, IndexerError>;

    /// Active marketplace sale of an asset.
    async fn fetch_active_sale(&self, asset_id: &AssetId) -> Result<Option<Listing>, IndexerError>;

    /// Cheapest active sale of a template.
    async fn fetch_lowest_listing(
        &self,
        template_id: &TemplateId,
    ) -> Result<Option<Listing>, IndexerError>;

    /// Liquid token balance of an account.
    async fn fetch_balance(&self, account: &AccountName) -> Result<Decimal, IndexerError>;
}

/// Error type for indexer operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexerError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 5xx server error)
    HttpError { status: u16, message: String },
    /// Invalid JSON or a response missing required fields
    ParseError(String),
    /// Rate limit exceeded
    RateLimited,
    /// The queried entity does not exist (yet)
    NotFound(String),
}

impl IndexerError {
    /// Whether waiting and asking again may give a different answer.
    pub fn is_transient(&self) -> bool {
        match self {
            IndexerError::NetworkError(_) | IndexerError::RateLimited => true,
            IndexerError::HttpError { status, .. } => *status >= 500,
            // The indexer may simply not have caught up yet.
            IndexerError::NotFound(_) => true,
            IndexerError::ParseError(_) => false,
        }
    }
}

impl fmt::Display for IndexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexerError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            IndexerError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            IndexerError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            IndexerError::RateLimited => write!(f, "Rate limited"),
            IndexerError::NotFound(what) => write!(f, "Not found: {}", what),
        }
    }
}

impl std::error::Error for IndexerError {}
