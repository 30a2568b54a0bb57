//! Classifying where an observed active came from.

use crate::domain::{AccountName, TimeMs, TransferRecord};

/// Origin of an active asset held by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Delivered to its current owner by the minting account.
    FreshMint,
    /// Delivered by someone else, or by the minting account before the
    /// current cycle dispatched its packs.
    PreExisting { sender: AccountName },
    /// The indexer's last transfer predates the current ownership.
    StaleIndex { recipient: AccountName },
}

/// Fresh iff the last transfer went to `owner`, came from `minting_account`
/// and happened no earlier than `minted_after`.
///
/// Actives minted by an earlier cycle and never returned still carry the
/// minting account as last sender; only the timestamp tells them apart.
pub fn classify(
    owner: &AccountName,
    last_transfer: &TransferRecord,
    minting_account: &AccountName,
    minted_after: TimeMs,
) -> Provenance {
    if !last_transfer.confirms_owner(owner) {
        return Provenance::StaleIndex {
            recipient: last_transfer.recipient.clone(),
        };
    }
    if &last_transfer.sender == minting_account && last_transfer.created_at >= minted_after {
        Provenance::FreshMint
    } else {
        Provenance::PreExisting {
            sender: last_transfer.sender.clone(),
        }
    }
}
