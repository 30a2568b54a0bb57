//! Pack discovery.

use crate::domain::{AccountName, AssetId, DisplayMode};
use crate::indexer::{AssetFilter, Indexer, IndexerError};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Lists the operator's assets matching any of a set of filters.
#[derive(Debug, Clone)]
pub struct PackCollector {
    indexer: Arc<dyn Indexer>,
    owner: AccountName,
    filters: Vec<AssetFilter>,
    display: DisplayMode,
}

impl PackCollector {
    pub fn new(indexer: Arc<dyn Indexer>, owner: AccountName, filters: Vec<AssetFilter>) -> Self {
        Self {
            indexer,
            owner,
            filters,
            display: DisplayMode::default(),
        }
    }

    pub fn with_display_mode(mut self, display: DisplayMode) -> Self {
        self.display = display;
        self
    }

    /// Owned ids across all filters, first occurrence wins. Empty is not an error.
    pub async fn collect(&self) -> Result<Vec<AssetId>, IndexerError> {
        let mut seen = HashSet::new();
        let mut packs = Vec::new();

        for filter in &self.filters {
            let ids = self.indexer.list_owned(&self.owner, filter).await?;
            for id in ids {
                if seen.insert(id.clone()) {
                    packs.push(id);
                }
            }
        }

        self.report(&packs);
        Ok(packs)
    }

    fn report(&self, packs: &[AssetId]) {
        match self.display {
            DisplayMode::Silent => debug!(count = packs.len(), owner = %self.owner, "Collected"),
            DisplayMode::Count => info!(count = packs.len(), owner = %self.owner, "Collected"),
            DisplayMode::Full => {
                let ids: Vec<&str> = packs.iter().map(AssetId::as_str).collect();
                info!(count = packs.len(), owner = %self.owner, ids = ?ids, "Collected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TemplateId;
    use crate::indexer::MockIndexer;

    fn template(id: &str) -> AssetFilter {
        AssetFilter::Template(TemplateId::new(id))
    }

    #[tokio::test]
    async fn deduplicates_across_filters_in_order() {
        let indexer = MockIndexer::new()
            .with_holdings("op", template("1"), vec![vec!["a", "b"]])
            .with_holdings("op", template("2"), vec![vec!["b", "c"]]);
        let collector = PackCollector::new(
            Arc::new(indexer),
            AccountName::new("op"),
            vec![template("1"), template("2")],
        )
        .with_display_mode(DisplayMode::Full);

        let packs = collector.collect().await.unwrap();
        assert_eq!(
            packs,
            vec![AssetId::new("a"), AssetId::new("b"), AssetId::new("c")]
        );
    }

    #[tokio::test]
    async fn nothing_owned_is_empty_not_error() {
        let collector = PackCollector::new(
            Arc::new(MockIndexer::new()),
            AccountName::new("op"),
            vec![template("1")],
        );
        assert!(collector.collect().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn query_failure_propagates() {
        let indexer = MockIndexer::new().with_list_failures(template("1"), 1);
        let collector = PackCollector::new(
            Arc::new(indexer),
            AccountName::new("op"),
            vec![template("1")],
        );
        assert!(collector.collect().await.is_err());
    }
}
