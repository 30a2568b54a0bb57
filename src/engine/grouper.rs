//! Grouping matched actives into per-recipient bulk-transfer batches.

use crate::domain::{AccountName, AssetId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;

/// Ledger ceiling on assets moved by a single transfer action.
pub const MAX_GROUP_SIZE: usize = 50;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GroupingError {
    /// Senders and actives are paired by position; unequal lengths mean the
    /// pairing is unknown and nothing may be returned.
    #[error("cannot pair {actives} matched actives with {senders} senders")]
    LengthMismatch { actives: usize, senders: usize },
    #[error("group size must be at least 1")]
    InvalidGroupSize,
}

/// One bulk transfer: up to `group_size` assets for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub recipient: AccountName,
    pub asset_ids: Vec<AssetId>,
}

impl Batch {
    pub fn new(recipient: AccountName, asset_ids: Vec<AssetId>) -> Self {
        Batch {
            recipient,
            asset_ids,
        }
    }

    /// Stable idempotency key: SHA-256 over the recipient and the ordered ids.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.recipient.as_str());
        for id in &self.asset_ids {
            hasher.update(b"\n");
            hasher.update(id.as_str());
        }
        hex::encode(hasher.finalize())
    }
}

/// Recipient → ordered batches. Recipients iterate in first-encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionGroup {
    order: Vec<AccountName>,
    batches: HashMap<AccountName, Vec<Vec<AssetId>>>,
}

impl TransactionGroup {
    pub fn recipients(&self) -> &[AccountName] {
        &self.order
    }

    pub fn batches_for(&self, recipient: &AccountName) -> &[Vec<AssetId>] {
        self.batches
            .get(recipient)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn batch_count(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Flatten into submission order: recipient by recipient, batch by batch.
    pub fn into_batches(mut self) -> Vec<Batch> {
        let mut out = Vec::new();
        for recipient in self.order {
            for asset_ids in self.batches.remove(&recipient).unwrap_or_default() {
                out.push(Batch::new(recipient.clone(), asset_ids));
            }
        }
        out
    }
}

/// Pair `actives[i]` with `senders[i]` and split each recipient's assets into
/// batches of at most `group_size`, preserving encounter order.
pub fn group_transactions(
    actives: &[AssetId],
    senders: &[AccountName],
    group_size: usize,
) -> Result<TransactionGroup, GroupingError> {
    if actives.len() != senders.len() {
        return Err(GroupingError::LengthMismatch {
            actives: actives.len(),
            senders: senders.len(),
        });
    }
    if group_size == 0 {
        return Err(GroupingError::InvalidGroupSize);
    }

    let mut group = TransactionGroup::default();
    for (asset_id, recipient) in actives.iter().zip(senders) {
        let batches = group.batches.entry(recipient.clone()).or_insert_with(|| {
            group.order.push(recipient.clone());
            vec![Vec::new()]
        });

        match batches.last_mut() {
            Some(last) if last.len() < group_size => last.push(asset_id.clone()),
            _ => batches.push(vec![asset_id.clone()]),
        }
    }

    Ok(group)
}
