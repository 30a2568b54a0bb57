//! Builders for the AtomicAssets, AtomicMarket and token contract actions.

use super::Action;
use crate::domain::{AccountName, AssetId, Decimal, SaleId, WAX_PRECISION, WAX_SYMBOL};
use serde_json::json;

pub const ASSETS_CONTRACT: &str = "atomicassets";
pub const MARKET_CONTRACT: &str = "atomicmarket";
pub const TOKEN_CONTRACT: &str = "eosio.token";

fn settlement_symbol() -> String {
    format!("{},{}", WAX_PRECISION, WAX_SYMBOL)
}

fn ids(asset_ids: &[AssetId]) -> Vec<&str> {
    asset_ids.iter().map(AssetId::as_str).collect()
}

/// Move one or more assets between accounts.
pub fn transfer_assets(
    from: &AccountName,
    to: &AccountName,
    asset_ids: &[AssetId],
    memo: &str,
) -> Action {
    Action::new(
        ASSETS_CONTRACT,
        "transfer",
        from.as_str(),
        json!({
            "from": from.as_str(),
            "to": to.as_str(),
            "asset_ids": ids(asset_ids),
            "memo": memo,
        }),
    )
}

/// Offer the asset to the market contract; paired with `announce_sale`.
pub fn create_sale_offer(seller: &AccountName, asset_id: &AssetId) -> Action {
    Action::new(
        ASSETS_CONTRACT,
        "createoffer",
        seller.as_str(),
        json!({
            "memo": "sale",
            "sender_asset_ids": [asset_id.as_str()],
            "recipient": MARKET_CONTRACT,
            "recipient_asset_ids": [],
            "sender": seller.as_str(),
        }),
    )
}

pub fn announce_sale(seller: &AccountName, asset_id: &AssetId, price: Decimal) -> Action {
    Action::new(
        MARKET_CONTRACT,
        "announcesale",
        seller.as_str(),
        json!({
            "seller": seller.as_str(),
            "asset_ids": [asset_id.as_str()],
            "listing_price": price.to_wax_quantity(),
            "settlement_symbol": settlement_symbol(),
            "maker_marketplace": "",
        }),
    )
}

pub fn cancel_sale(seller: &AccountName, sale_id: &SaleId) -> Action {
    Action::new(
        MARKET_CONTRACT,
        "cancelsale",
        seller.as_str(),
        json!({ "sale_id": sale_id.as_str() }),
    )
}

/// Guard a purchase against the sale changing between lookup and execution.
pub fn assert_sale(
    buyer: &AccountName,
    asset_id: &AssetId,
    sale_id: &SaleId,
    price: Decimal,
) -> Action {
    Action::new(
        MARKET_CONTRACT,
        "assertsale",
        buyer.as_str(),
        json!({
            "asset_ids_to_assert": [asset_id.as_str()],
            "sale_id": sale_id.as_str(),
            "listing_price_to_assert": price.to_wax_quantity(),
            "settlement_symbol_to_assert": settlement_symbol(),
        }),
    )
}

pub fn transfer_tokens(from: &AccountName, to: &str, amount: Decimal, memo: &str) -> Action {
    Action::new(
        TOKEN_CONTRACT,
        "transfer",
        from.as_str(),
        json!({
            "from": from.as_str(),
            "to": to,
            "quantity": amount.to_wax_quantity(),
            "memo": memo,
        }),
    )
}

pub fn purchase_sale(buyer: &AccountName, sale_id: &SaleId) -> Action {
    Action::new(
        MARKET_CONTRACT,
        "purchasesale",
        buyer.as_str(),
        json!({
            "buyer": buyer.as_str(),
            "intended_delphi_median": 0,
            "sale_id": sale_id.as_str(),
            "taker_marketplace": "",
        }),
    )
}

/// The three actions of a purchase: assert, deposit, purchase.
pub fn buy_listing(
    buyer: &AccountName,
    asset_id: &AssetId,
    sale_id: &SaleId,
    price: Decimal,
) -> Vec<Action> {
    vec![
        assert_sale(buyer, asset_id, sale_id, price),
        transfer_tokens(buyer, MARKET_CONTRACT, price, "deposit"),
        purchase_sale(buyer, sale_id),
    ]
}
