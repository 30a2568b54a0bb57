//! AtomicAssets / AtomicMarket indexer client.

use super::schema::{AccountStateResponse, Envelope, RawAsset, RawSale, RawTransfer};
use super::{AssetFilter, Indexer, IndexerError};
use crate::domain::{AccountName, Asset, AssetId, Decimal, Listing, TemplateId, TransferRecord};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Page size used for ownership queries; the indexer caps it at 100.
pub const PAGE_LIMIT: usize = 100;

/// Indexer backed by the public AtomicAssets HTTP API and a chain state API.
#[derive(Debug, Clone)]
pub struct AtomicIndexer {
    client: Client,
    base_url: String,
    chain_url: String,
    max_elapsed: Duration,
}

impl AtomicIndexer {
    pub fn new(base_url: String, chain_url: String) -> Self {
        Self {
            client: Client::builder()
                .user_agent("Mozilla/5.0")
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            chain_url: chain_url.trim_end_matches('/').to_string(),
            max_elapsed: Duration::from_secs(30),
        }
    }

    /// Create with the default public WAX endpoints.
    pub fn default_urls() -> Self {
        Self::new(
            "https://wax.api.atomicassets.io".to_string(),
            "https://api.waxsweden.org".to_string(),
        )
    }

    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, IndexerError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(IndexerError::NetworkError(e.to_string())))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(backoff::Error::transient(IndexerError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(IndexerError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if status == StatusCode::NOT_FOUND {
                return Err(backoff::Error::permanent(IndexerError::NotFound(
                    url.to_string(),
                )));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(IndexerError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<T>()
                .await
                .map_err(|e| backoff::Error::permanent(IndexerError::ParseError(e.to_string())))
        })
        .await
    }

    async fn sales(&self, query: &[(&str, String)]) -> Result<Vec<RawSale>, IndexerError> {
        let url = format!("{}/atomicmarket/v1/sales", self.base_url);
        let envelope: Envelope<Vec<RawSale>> = self.get_json(&url, query).await?;
        envelope.into_data()
    }
}

#[async_trait]
impl Indexer for AtomicIndexer {
    async fn list_owned(
        &self,
        owner: &AccountName,
        filter: &AssetFilter,
    ) -> Result<Vec<AssetId>, IndexerError> {
        debug!(owner = %owner, filter = %filter, "Listing owned assets");

        let url = format!("{}/atomicassets/v1/assets", self.base_url);
        let (filter_key, filter_value) = match filter {
            AssetFilter::Template(id) => ("template_id", id.as_str().to_string()),
            AssetFilter::Category(name) => ("schema_name", name.clone()),
        };

        let mut ids = Vec::new();
        let mut page = 1usize;
        loop {
            let query = [
                ("owner", owner.as_str().to_string()),
                (filter_key, filter_value.clone()),
                ("page", page.to_string()),
                ("limit", PAGE_LIMIT.to_string()),
                ("order", "desc".to_string()),
            ];
            let envelope: Envelope<Vec<RawAsset>> = self.get_json(&url, &query).await?;
            let batch = envelope.into_data()?;
            let short_page = batch.len() < PAGE_LIMIT;
            ids.extend(batch.into_iter().map(|raw| AssetId::new(raw.asset_id)));
            if short_page {
                break;
            }
            page += 1;
        }

        Ok(ids)
    }

    async fn fetch_asset(&self, asset_id: &AssetId) -> Result<Asset, IndexerError> {
        debug!(asset_id = %asset_id, "Fetching asset");

        let url = format!("{}/atomicassets/v1/assets/{}", self.base_url, asset_id);
        let envelope: Envelope<Option<RawAsset>> = self.get_json(&url, &[]).await?;
        envelope
            .into_data()?
            .map(RawAsset::into_asset)
            .ok_or_else(|| IndexerError::NotFound(format!("asset {}", asset_id)))
    }

    async fn fetch_last_transfer(
        &self,
        asset_id: &AssetId,
    ) -> Result<Option<TransferRecord>, IndexerError> {
        debug!(asset_id = %asset_id, "Fetching last transfer");

        let url = format!("{}/atomicassets/v1/transfers", self.base_url);
        let query = [
            ("asset_id", asset_id.as_str().to_string()),
            ("limit", "1".to_string()),
            ("order", "desc".to_string()),
        ];
        let envelope: Envelope<Vec<RawTransfer>> = self.get_json(&url, &query).await?;
        envelope
            .into_data()?
            .into_iter()
            .next()
            .map(RawTransfer::into_record)
            .transpose()
    }

    async fn fetch_active_sale(&self, asset_id: &AssetId) -> Result<Option<Listing>, IndexerError> {
        let query = [
            ("asset_id", asset_id.as_str().to_string()),
            ("state", "1".to_string()),
        ];
        self.sales(&query)
            .await?
            .into_iter()
            .next()
            .map(|sale| sale.into_listing(Some(asset_id)))
            .transpose()
    }

    async fn fetch_lowest_listing(
        &self,
        template_id: &TemplateId,
    ) -> Result<Option<Listing>, IndexerError> {
        let query = [
            ("template_id", template_id.as_str().to_string()),
            ("state", "1".to_string()),
            ("sort", "price".to_string()),
            ("order", "asc".to_string()),
            ("limit", "1".to_string()),
        ];
        self.sales(&query)
            .await?
            .into_iter()
            .next()
            .map(|sale| sale.into_listing(None))
            .transpose()
    }

    async fn fetch_balance(&self, account: &AccountName) -> Result<Decimal, IndexerError> {
        let url = format!("{}/v2/state/get_account", self.chain_url);
        let query = [
            ("account", account.as_str().to_string()),
            ("limit", "1".to_string()),
        ];
        let response: AccountStateResponse = self.get_json(&url, &query).await?;
        response.account.liquid_balance()
    }
}
