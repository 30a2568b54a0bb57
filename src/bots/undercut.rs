//! Keeps one listed asset just under the cheapest competing listing.

use super::{BotError, StoreHandle, TrackedAsset, TrackedFile};
use crate::domain::{AccountName, Decimal, TemplateId};
use crate::engine::{undercut_price, ErrorStreak};
use crate::market::{AssetHandle, Gateway};
use crate::orchestration::pause;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndercutPacing {
    pub rate_limit: Duration,
    pub api_refresh: Duration,
    pub error_retry: Duration,
    pub max_consecutive_errors: u32,
}

impl From<&TrackedFile> for UndercutPacing {
    fn from(file: &TrackedFile) -> Self {
        UndercutPacing {
            rate_limit: file.rate_limit(),
            api_refresh: file.api_refresh(),
            error_retry: file.error_retry(),
            max_consecutive_errors: file.max_consecutive_errors.max(1),
        }
    }
}

/// Why an undercut task stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndercutExit {
    Sold,
    MinimumReached,
}

enum Step {
    Continue(Duration),
    Done(UndercutExit),
}

#[derive(Debug)]
pub struct UndercutBot {
    gateway: Gateway,
    handle: AssetHandle,
    template_id: TemplateId,
    seller: AccountName,
    min_price: Decimal,
    increment: Decimal,
    pacing: UndercutPacing,
    store: StoreHandle,
}

impl UndercutBot {
    /// Hydrate the asset and make sure it is listed at a valid starting price.
    ///
    /// Fails with [`BotError::BelowMinimum`] if even the first undercut would
    /// go below the floor; nothing is listed in that case.
    pub async fn initialise(
        gateway: Gateway,
        tracked: &TrackedAsset,
        pacing: UndercutPacing,
        store: StoreHandle,
    ) -> Result<Self, BotError> {
        let mut handle = gateway.asset(tracked.asset_id.clone());
        handle.refresh().await?;

        let asset = handle.asset();
        let template_id = asset
            .template_id
            .clone()
            .ok_or_else(|| BotError::NoTemplate(asset.asset_id.clone()))?;
        let seller = handle.fetch_owner().await?;

        let mut bot = UndercutBot {
            gateway,
            handle,
            template_id,
            seller,
            min_price: tracked.min_price,
            increment: tracked.increment,
            pacing,
            store,
        };

        if !bot.handle.asset().is_listed() {
            bot.list_under_lowest().await?;
            pause(bot.pacing.api_refresh).await;
        }
        Ok(bot)
    }

    async fn list_under_lowest(&mut self) -> Result<(), BotError> {
        let lowest = self
            .gateway
            .indexer
            .fetch_lowest_listing(&self.template_id)
            .await?
            .ok_or_else(|| BotError::NoListing(self.template_id.clone()))?;
        let start = undercut_price(lowest.price, self.increment, self.min_price).map_err(|e| {
            warn!(
                asset_id = %self.handle.id(),
                start = %e.candidate,
                min_price = %e.min_price,
                "Starting price below minimum, listing withheld"
            );
            e
        })?;

        self.handle.sell(start).await?;
        info!(asset_id = %self.handle.id(), price = %start, "Listed for sale");
        Ok(())
    }

    /// Adjust the price until the asset sells or the floor is reached.
    pub async fn run(mut self) -> Result<UndercutExit, BotError> {
        let mut streak = ErrorStreak::new();

        loop {
            match self.step().await {
                Ok(Step::Continue(wait)) => {
                    streak.reset();
                    pause(wait).await;
                }
                Ok(Step::Done(exit)) => return Ok(exit),
                Err(e @ BotError::BelowMinimum(_)) => return Err(e),
                Err(e) => {
                    let errors = streak.record_failure();
                    if streak.exhausted(self.pacing.max_consecutive_errors) {
                        return Err(BotError::TooManyErrors {
                            errors,
                            last: e.to_string(),
                        });
                    }
                    let backoff = streak.delay(self.pacing.error_retry);
                    warn!(
                        asset_id = %self.handle.id(),
                        errors,
                        transient = e.is_transient(),
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Undercut step failed, retrying"
                    );
                    pause(backoff).await;
                }
            }
        }
    }

    async fn step(&mut self) -> Result<Step, BotError> {
        if self.handle.fetch_market_details().await?.is_none() {
            let current = self
                .gateway
                .indexer
                .fetch_asset(self.handle.id())
                .await?;
            if current.owner.as_ref() != Some(&self.seller) {
                info!(asset_id = %self.handle.id(), "Asset sold");
                self.store.remove(self.handle.id().clone()).await?;
                return Ok(Step::Done(UndercutExit::Sold));
            }
            warn!(asset_id = %self.handle.id(), "Listing disappeared, relisting");
            return match self.list_under_lowest().await {
                Ok(()) => Ok(Step::Continue(self.pacing.api_refresh)),
                Err(BotError::BelowMinimum(_)) => Ok(Step::Done(UndercutExit::MinimumReached)),
                Err(e) => Err(e),
            };
        }

        let lowest = match self
            .gateway
            .indexer
            .fetch_lowest_listing(&self.template_id)
            .await?
        {
            Some(lowest) => lowest,
            None => return Err(BotError::NoListing(self.template_id.clone())),
        };
        if &lowest.asset_id == self.handle.id() {
            return Ok(Step::Continue(self.pacing.rate_limit));
        }

        let new_price = match undercut_price(lowest.price, self.increment, self.min_price) {
            Ok(price) => price,
            Err(e) => {
                info!(
                    asset_id = %self.handle.id(),
                    candidate = %e.candidate,
                    min_price = %e.min_price,
                    "Minimum price reached"
                );
                return Ok(Step::Done(UndercutExit::MinimumReached));
            }
        };

        self.handle.update_offer(new_price).await?;
        Ok(Step::Continue(self.pacing.api_refresh))
    }
}

/// One task per tracked asset, started one `stagger` apart, all awaited.
pub async fn run_undercut_bots(
    gateway: Gateway,
    file: &TrackedFile,
    store: StoreHandle,
    stagger: Duration,
) -> Vec<Result<UndercutExit, BotError>> {
    let pacing = UndercutPacing::from(file);
    let mut tasks = Vec::with_capacity(file.assets.len());

    for (i, tracked) in file.assets.iter().cloned().enumerate() {
        if i > 0 {
            pause(stagger).await;
        }
        let gateway = gateway.clone();
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let asset_id = tracked.asset_id.clone();
            let result = match UndercutBot::initialise(gateway, &tracked, pacing, store).await {
                Ok(bot) => bot.run().await,
                Err(e) => Err(e),
            };
            match &result {
                Ok(exit) => info!(asset_id = %asset_id, exit = ?exit, "Undercut bot finished"),
                Err(e) => error!(asset_id = %asset_id, error = %e, "Undercut bot stopped"),
            }
            result
        }));
    }

    futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| {
            joined.unwrap_or_else(|e| {
                Err(BotError::TooManyErrors {
                    errors: 0,
                    last: format!("task aborted: {}", e),
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bots::spawn_store;
    use crate::domain::{Asset, AssetId, Listing, SaleId};
    use crate::indexer::MockIndexer;
    use crate::ledger::MockSubmitter;
    use std::str::FromStr;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn listing(asset: &str, sale: &str, seller: &str, px: &str) -> Listing {
        Listing {
            asset_id: AssetId::new(asset),
            sale_id: SaleId::new(sale),
            seller: AccountName::new(seller),
            price: d(px),
        }
    }

    fn owned(asset: &str, owner: &str) -> Asset {
        Asset::new(AssetId::new(asset))
            .with_owner(AccountName::new(owner))
            .with_template(TemplateId::new("t1"), Some("Spin".to_string()))
    }

    fn pacing() -> UndercutPacing {
        UndercutPacing {
            rate_limit: Duration::from_millis(1),
            api_refresh: Duration::from_millis(1),
            error_retry: Duration::from_millis(1),
            max_consecutive_errors: 3,
        }
    }

    fn tracked(min: &str, inc: &str) -> TrackedAsset {
        TrackedAsset {
            asset_id: AssetId::new("mine"),
            min_price: d(min),
            increment: d(inc),
        }
    }

    fn tracked_file() -> TrackedFile {
        TrackedFile {
            rate_limit_seconds: 0,
            api_refresh_seconds: 0,
            error_retry_seconds: 0,
            max_consecutive_errors: 3,
            assets: vec![tracked("1", "0.5")],
        }
    }

    #[tokio::test]
    async fn start_price_below_minimum_lists_nothing() {
        let dir = TempDir::new().unwrap();
        let (store, _task) = spawn_store(dir.path().join("t.json"), tracked_file());
        let indexer = MockIndexer::new()
            .with_asset(owned("mine", "op"))
            .with_lowest_listings("t1", vec![Some(listing("other", "s1", "bob", "1.2"))]);
        let submitter = Arc::new(MockSubmitter::new());
        let gw = Gateway::new(Arc::new(indexer), submitter.clone());

        let err = UndercutBot::initialise(gw, &tracked("1", "0.5"), pacing(), store)
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::BelowMinimum(_)));
        assert!(submitter.submitted().is_empty());
    }

    #[tokio::test]
    async fn undercuts_until_minimum() {
        let dir = TempDir::new().unwrap();
        let (store, _task) = spawn_store(dir.path().join("t.json"), tracked_file());
        let indexer = MockIndexer::new()
            .with_asset(owned("mine", "op"))
            .with_sale(listing("mine", "s0", "op", "9"))
            .with_lowest_listings(
                "t1",
                vec![
                    Some(listing("other", "s1", "bob", "5")),
                    Some(listing("mine", "s0", "op", "4.5")),
                    Some(listing("other", "s2", "bob", "1.2")),
                ],
            );
        let submitter = Arc::new(MockSubmitter::new());
        let gw = Gateway::new(Arc::new(indexer), submitter.clone());

        let bot = UndercutBot::initialise(gw, &tracked("1", "0.5"), pacing(), store)
            .await
            .unwrap();
        let exit = bot.run().await.unwrap();

        assert_eq!(exit, UndercutExit::MinimumReached);
        let updates = submitter.submitted_named("cancelsale");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0][1].data["listing_price"], "4.50000000 WAX");
    }

    #[tokio::test]
    async fn sold_asset_is_removed_from_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.json");
        let (store, _task) = spawn_store(path.clone(), tracked_file());
        let indexer = Arc::new(
            MockIndexer::new()
                .with_asset(owned("mine", "op"))
                .with_sale(listing("mine", "s0", "op", "9"))
                .with_lowest_listings("t1", vec![Some(listing("mine", "s0", "op", "9"))]),
        );
        let gw = Gateway::new(indexer.clone(), Arc::new(MockSubmitter::new()));

        let bot = UndercutBot::initialise(gw, &tracked("1", "0.5"), pacing(), store.clone())
            .await
            .unwrap();
        let running = tokio::spawn(bot.run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        indexer.remove_sale(&AssetId::new("mine"));
        indexer.set_asset(owned("mine", "buyer"));

        assert_eq!(running.await.unwrap().unwrap(), UndercutExit::Sold);
        assert!(store.snapshot().await.unwrap().assets.is_empty());
        assert!(TrackedFile::load(&path).unwrap().assets.is_empty());
    }

    #[tokio::test]
    async fn gives_up_after_consecutive_errors() {
        let dir = TempDir::new().unwrap();
        let (store, _task) = spawn_store(dir.path().join("t.json"), tracked_file());
        let indexer = MockIndexer::new()
            .with_asset(owned("mine", "op"))
            .with_sale(listing("mine", "s0", "op", "9"))
            .with_lowest_listings("t1", vec![Some(listing("other", "s1", "bob", "5"))]);
        let submitter = Arc::new(MockSubmitter::new().with_failing_asset("mine"));
        let gw = Gateway::new(Arc::new(indexer), submitter);

        let bot = UndercutBot::initialise(gw, &tracked("1", "0.5"), pacing(), store)
            .await
            .unwrap();
        let err = bot.run().await.unwrap_err();
        assert!(matches!(err, BotError::TooManyErrors { errors: 3, .. }));
    }
}
