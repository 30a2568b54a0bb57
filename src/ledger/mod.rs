//! Ledger action submission.
//!
//! A transaction is an ordered list of [`Action`]s executed atomically by an
//! external signer. Nothing in this crate holds keys.

use crate::domain::TxId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod actions;
pub mod mock;
pub mod signer;

pub use mock::MockSubmitter;
pub use signer::CommandSubmitter;

/// Permission level used for every authorization.
pub const ACTIVE_PERMISSION: &str = "active";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub actor: String,
    pub permission: String,
}

/// One contract action: target contract, action name, authorizer and payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub account: String,
    pub name: String,
    pub authorization: Vec<Authorization>,
    pub data: serde_json::Value,
}

impl Action {
    pub fn new(account: &str, name: &str, actor: &str, data: serde_json::Value) -> Self {
        Action {
            account: account.to_string(),
            name: name.to_string(),
            authorization: vec![Authorization {
                actor: actor.to_string(),
                permission: ACTIVE_PERMISSION.to_string(),
            }],
            data,
        }
    }

    /// Asset ids referenced by this action's payload, if any.
    pub fn asset_ids(&self) -> Vec<String> {
        ["asset_ids", "sender_asset_ids", "asset_ids_to_assert"]
            .iter()
            .filter_map(|key| self.data.get(*key).and_then(|v| v.as_array()))
            .flatten()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

/// Executes a list of actions as a single atomic transaction.
#[async_trait]
pub trait ActionSubmitter: Send + Sync + fmt::Debug {
    async fn submit(&self, actions: &[Action]) -> Result<TxId, SubmitError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The transaction referenced state that no longer exists (typically a
    /// sale that was bought or cancelled in the meantime).
    #[error("stale reference: {0}")]
    StaleReference(String),
    /// The chain rejected the transaction.
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// The signer could not be run or produced no transaction id.
    #[error("signer failure: {0}")]
    Signer(String),
}

impl SubmitError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SubmitError::StaleReference(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_serializes_in_signer_shape() {
        let action = Action::new("atomicmarket", "cancelsale", "op", json!({ "sale_id": "9" }));
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!({
                "account": "atomicmarket",
                "name": "cancelsale",
                "authorization": [{ "actor": "op", "permission": "active" }],
                "data": { "sale_id": "9" }
            })
        );
    }

    #[test]
    fn asset_ids_are_extracted_from_known_keys() {
        let action = Action::new(
            "atomicassets",
            "transfer",
            "op",
            json!({ "asset_ids": ["1", "2"], "memo": "" }),
        );
        assert_eq!(action.asset_ids(), vec!["1".to_string(), "2".to_string()]);

        let action = Action::new("eosio.token", "transfer", "op", json!({ "quantity": "1 WAX" }));
        assert!(action.asset_ids().is_empty());
    }

    #[test]
    fn only_stale_references_are_transient() {
        assert!(SubmitError::StaleReference("x".into()).is_transient());
        assert!(!SubmitError::Rejected("x".into()).is_transient());
        assert!(!SubmitError::Signer("x".into()).is_transient());
    }
}
