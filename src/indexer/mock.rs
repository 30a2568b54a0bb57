//! Mock indexer for testing without network calls.
//!
//! Ownership queries and lowest-listing queries can be scripted as a sequence
//! of snapshots: each call consumes one snapshot and the last one repeats,
//! which models an indexer that catches up over time.

use super::{AssetFilter, Indexer, IndexerError};
use crate::domain::{
    AccountName, Asset, AssetId, Decimal, Listing, TemplateId, TimeMs, TransferRecord,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MockState {
    assets: HashMap<AssetId, Asset>,
    transfers: HashMap<AssetId, TransferRecord>,
    holdings: HashMap<(AccountName, AssetFilter), VecDeque<Vec<AssetId>>>,
    sales: HashMap<AssetId, Listing>,
    lowest: HashMap<TemplateId, VecDeque<Option<Listing>>>,
    balances: HashMap<AccountName, Decimal>,
    failing_assets: HashSet<AssetId>,
    list_failures: HashMap<AssetFilter, u32>,
    list_calls: HashMap<AssetFilter, usize>,
}

/// Mock indexer that returns predefined test data.
#[derive(Debug, Default)]
pub struct MockIndexer {
    state: Mutex<MockState>,
}

fn next_snapshot<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl MockIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state(self, f: impl FnOnce(&mut MockState)) -> Self {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
        self
    }

    /// Register an asset's details.
    pub fn with_asset(self, asset: Asset) -> Self {
        self.with_state(|s| {
            s.assets.insert(asset.asset_id.clone(), asset);
        })
    }

    /// Register an asset owned by `owner` whose last transfer, from
    /// `last_transfer_from`, happened just now.
    pub fn with_owned_asset(self, asset_id: &str, owner: &str, last_transfer_from: &str) -> Self {
        let id = AssetId::new(asset_id);
        let owner = AccountName::new(owner);
        self.with_asset(Asset::new(id.clone()).with_owner(owner.clone()))
            .with_transfer(
                id,
                TransferRecord::new(AccountName::new(last_transfer_from), owner)
                    .with_created_at(TimeMs::now()),
            )
    }

    pub fn with_transfer(self, asset_id: AssetId, transfer: TransferRecord) -> Self {
        self.with_state(|s| {
            s.transfers.insert(asset_id, transfer);
        })
    }

    /// Script the successive answers of an ownership query.
    pub fn with_holdings(
        self,
        owner: &str,
        filter: AssetFilter,
        snapshots: Vec<Vec<&str>>,
    ) -> Self {
        let snapshots = snapshots
            .into_iter()
            .map(|snap| snap.into_iter().map(AssetId::new).collect())
            .collect();
        self.with_state(|s| {
            s.holdings
                .insert((AccountName::new(owner), filter), snapshots);
        })
    }

    /// Make the next `count` ownership queries for `filter` fail.
    pub fn with_list_failures(self, filter: AssetFilter, count: u32) -> Self {
        self.with_state(|s| {
            s.list_failures.insert(filter, count);
        })
    }

    /// Every lookup of this asset fails with a network error.
    pub fn with_failing_asset(self, asset_id: &str) -> Self {
        self.with_state(|s| {
            s.failing_assets.insert(AssetId::new(asset_id));
        })
    }

    pub fn with_sale(self, listing: Listing) -> Self {
        self.with_state(|s| {
            s.sales.insert(listing.asset_id.clone(), listing);
        })
    }

    /// Script the successive answers of a lowest-listing query.
    pub fn with_lowest_listings(self, template_id: &str, listings: Vec<Option<Listing>>) -> Self {
        self.with_state(|s| {
            s.lowest
                .insert(TemplateId::new(template_id), listings.into_iter().collect());
        })
    }

    pub fn with_balance(self, account: &str, balance: Decimal) -> Self {
        self.with_state(|s| {
            s.balances.insert(AccountName::new(account), balance);
        })
    }

    /// Replace an asset's details after construction.
    pub fn set_asset(&self, asset: Asset) {
        if let Ok(mut state) = self.state.lock() {
            state.assets.insert(asset.asset_id.clone(), asset);
        }
    }

    pub fn remove_sale(&self, asset_id: &AssetId) {
        if let Ok(mut state) = self.state.lock() {
            state.sales.remove(asset_id);
        }
    }

    /// Number of ownership queries served for `filter`, failures included.
    pub fn list_calls(&self, filter: &AssetFilter) -> usize {
        self.state
            .lock()
            .map(|s| s.list_calls.get(filter).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MockState>, IndexerError> {
        self.state
            .lock()
            .map_err(|_| IndexerError::NetworkError("mock state poisoned".to_string()))
    }
}

#[async_trait]
impl Indexer for MockIndexer {
    async fn list_owned(
        &self,
        owner: &AccountName,
        filter: &AssetFilter,
    ) -> Result<Vec<AssetId>, IndexerError> {
        let mut state = self.lock()?;
        *state.list_calls.entry(filter.clone()).or_insert(0) += 1;

        if let Some(remaining) = state.list_failures.get_mut(filter) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(IndexerError::HttpError {
                    status: 503,
                    message: "Service unavailable".to_string(),
                });
            }
        }

        Ok(state
            .holdings
            .get_mut(&(owner.clone(), filter.clone()))
            .and_then(next_snapshot)
            .unwrap_or_default())
    }

    async fn fetch_asset(&self, asset_id: &AssetId) -> Result<Asset, IndexerError> {
        let state = self.lock()?;
        if state.failing_assets.contains(asset_id) {
            return Err(IndexerError::NetworkError("connection reset".to_string()));
        }
        state
            .assets
            .get(asset_id)
            .cloned()
            .ok_or_else(|| IndexerError::NotFound(format!("asset {}", asset_id)))
    }

    async fn fetch_last_transfer(
        &self,
        asset_id: &AssetId,
    ) -> Result<Option<TransferRecord>, IndexerError> {
        let state = self.lock()?;
        if state.failing_assets.contains(asset_id) {
            return Err(IndexerError::NetworkError("connection reset".to_string()));
        }
        Ok(state.transfers.get(asset_id).cloned())
    }

    async fn fetch_active_sale(&self, asset_id: &AssetId) -> Result<Option<Listing>, IndexerError> {
        Ok(self.lock()?.sales.get(asset_id).cloned())
    }

    async fn fetch_lowest_listing(
        &self,
        template_id: &TemplateId,
    ) -> Result<Option<Listing>, IndexerError> {
        let mut state = self.lock()?;
        Ok(state
            .lowest
            .get_mut(template_id)
            .and_then(next_snapshot)
            .flatten())
    }

    async fn fetch_balance(&self, account: &AccountName) -> Result<Decimal, IndexerError> {
        Ok(self
            .lock()?
            .balances
            .get(account)
            .copied()
            .unwrap_or_default())
    }
}
