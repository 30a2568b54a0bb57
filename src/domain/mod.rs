//! Domain types for pack opening and asset markets.
//!
//! This module provides:
//! - Domain primitives: TimeMs, AccountName, AssetId, TemplateId, SaleId, TxId
//! - Lossless WAX amounts via the Decimal wrapper
//! - The cached Asset view, transfer records and listings
//! - Per-cycle reconciliation state

pub mod asset;
pub mod cycle;
pub mod decimal;
pub mod primitives;
pub mod transfer;

pub use asset::Asset;
pub use cycle::{CycleState, DisplayMode, MatchedActives, PollOutcome};
pub use decimal::{Decimal, DecimalError, WAX_PRECISION, WAX_SYMBOL};
pub use primitives::{AccountName, AssetId, SaleId, TemplateId, TimeMs, TxId};
pub use transfer::{Listing, TransferRecord};
