//! Buys the cheapest listing of one template whenever it is at or under target.

use super::BotError;
use crate::config::BuyTarget;
use crate::domain::{AccountName, Asset, AssetId, Decimal, Listing, TemplateId, TxId};
use crate::ledger::SubmitError;
use crate::market::{AssetError, AssetHandle, Gateway};
use crate::orchestration::pause;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct BuyerSettings {
    pub buyer: AccountName,
    pub template_id: TemplateId,
    pub max_price: Decimal,
    pub rate_limit: Duration,
    pub balance_refresh: Duration,
    pub low_balance_pause: Duration,
}

impl BuyerSettings {
    pub fn new(buyer: AccountName, target: BuyTarget) -> Self {
        BuyerSettings {
            buyer,
            template_id: target.template_id,
            max_price: target.max_price,
            rate_limit: Duration::from_millis(500),
            balance_refresh: Duration::from_secs(60),
            low_balance_pause: Duration::from_secs(60),
        }
    }
}

/// Result of one polling round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Bought {
        asset_id: AssetId,
        price: Decimal,
        tx: TxId,
    },
    NoDeal,
    LowBalance,
    Failed,
}

#[derive(Debug)]
pub struct BuyerBot {
    gateway: Gateway,
    settings: BuyerSettings,
    balance: Decimal,
    refreshed_at: Instant,
    low_balance_warned: bool,
    error_logged: bool,
}

impl BuyerBot {
    /// Read the starting balance and build the bot.
    pub async fn start(gateway: Gateway, settings: BuyerSettings) -> Result<Self, BotError> {
        let balance = gateway
            .account(settings.buyer.clone())
            .balance()
            .await?;
        info!(balance = %balance, "Starting balance");

        Ok(BuyerBot {
            gateway,
            settings,
            balance,
            refreshed_at: Instant::now(),
            low_balance_warned: false,
            error_logged: false,
        })
    }

    /// Cached balance, debited locally after every purchase.
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub async fn run(mut self) {
        loop {
            match self.tick().await {
                Tick::LowBalance => {
                    pause(self.settings.low_balance_pause).await;
                    self.refresh_balance().await;
                }
                _ => pause(self.settings.rate_limit).await,
            }
        }
    }

    pub async fn tick(&mut self) -> Tick {
        if self.refreshed_at.elapsed() >= self.settings.balance_refresh {
            self.refresh_balance().await;
        }

        if self.balance < self.settings.max_price {
            if !self.low_balance_warned {
                warn!(
                    balance = %self.balance,
                    target = %self.settings.max_price,
                    "Balance below target price, pausing"
                );
                self.low_balance_warned = true;
            }
            return Tick::LowBalance;
        }
        self.low_balance_warned = false;

        match self.try_buy().await {
            Ok(tick) => {
                self.error_logged = false;
                tick
            }
            Err(BotError::Asset(AssetError::Submit(SubmitError::StaleReference(msg)))) => {
                debug!(reason = %msg, "Listing already gone");
                Tick::NoDeal
            }
            Err(e) => {
                if !self.error_logged {
                    error!(error = %e, "Buyer round failed");
                    self.error_logged = true;
                }
                Tick::Failed
            }
        }
    }

    async fn try_buy(&mut self) -> Result<Tick, BotError> {
        let lowest = self
            .gateway
            .indexer
            .fetch_lowest_listing(&self.settings.template_id)
            .await?;

        let Some(listing) = lowest else {
            return Ok(Tick::NoDeal);
        };
        if listing.price > self.settings.max_price || listing.price > self.balance {
            return Ok(Tick::NoDeal);
        }

        let tx = self.buy(&listing).await?;
        self.balance -= listing.price;
        info!(
            asset_id = %listing.asset_id,
            price = %listing.price,
            remaining = %self.balance,
            tx_id = %tx,
            "Purchased"
        );
        Ok(Tick::Bought {
            asset_id: listing.asset_id,
            price: listing.price,
            tx,
        })
    }

    async fn buy(&self, listing: &Listing) -> Result<TxId, AssetError> {
        let asset =
            Asset::new(listing.asset_id.clone()).with_sale(listing.sale_id.clone(), listing.price);
        AssetHandle::from_asset(asset, self.gateway.clone())
            .buy(&self.settings.buyer)
            .await
    }

    async fn refresh_balance(&mut self) {
        match self
            .gateway
            .account(self.settings.buyer.clone())
            .balance()
            .await
        {
            Ok(balance) => {
                if balance != self.balance && !self.low_balance_warned {
                    info!(balance = %balance, "Balance updated");
                }
                self.balance = balance;
            }
            Err(e) => warn!(error = %e, "Balance refresh failed, keeping cached value"),
        }
        self.refreshed_at = Instant::now();
    }
}
