//! The tracked-asset file driving the undercut bots.

use super::StoreError;
use crate::domain::{AssetId, Decimal};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_max_consecutive_errors() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedAsset {
    pub asset_id: AssetId,
    pub min_price: Decimal,
    pub increment: Decimal,
}

/// Global pacing plus the assets still being worked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    pub rate_limit_seconds: u64,
    pub api_refresh_seconds: u64,
    pub error_retry_seconds: u64,
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
    #[serde(default)]
    pub assets: Vec<TrackedAsset>,
}

impl TrackedFile {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write to a sibling temporary file, then rename over `path`.
    pub fn save_atomic(&self, path: &Path) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(self)?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Returns false if the asset was not tracked.
    pub fn remove(&mut self, asset_id: &AssetId) -> bool {
        let before = self.assets.len();
        self.assets.retain(|a| &a.asset_id != asset_id);
        self.assets.len() != before
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_secs(self.rate_limit_seconds)
    }

    pub fn api_refresh(&self) -> Duration {
        Duration::from_secs(self.api_refresh_seconds)
    }

    pub fn error_retry(&self) -> Duration {
        Duration::from_secs(self.error_retry_seconds)
    }
}
