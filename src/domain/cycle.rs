//! Per-cycle reconciliation state.

use crate::domain::{AccountName, AssetId, TimeMs};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// How much of a collection query is echoed to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Silent,
    #[default]
    Count,
    Full,
}

/// Terminal state of the convergence poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state")]
pub enum PollOutcome {
    /// Observed count reached the expected count on the given attempt (1-based).
    Converged { attempts: u32 },
    /// Budget spent without convergence; the last observation is used anyway.
    Exhausted { attempts: u32 },
}

impl PollOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Converged { attempts } | PollOutcome::Exhausted { attempts } => *attempts,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PollOutcome::Converged { .. } => "converged",
            PollOutcome::Exhausted { .. } => "exhausted",
        }
    }
}

/// Ordered set of active asset ids attributed to this cycle's mint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchedActives {
    order: Vec<AssetId>,
    seen: HashSet<AssetId>,
}

impl MatchedActives {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the id was already present.
    pub fn insert(&mut self, asset_id: AssetId) -> bool {
        if !self.seen.insert(asset_id.clone()) {
            return false;
        }
        self.order.push(asset_id);
        true
    }

    pub fn contains(&self, asset_id: &AssetId) -> bool {
        self.seen.contains(asset_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[AssetId] {
        &self.order
    }
}

/// State threaded through one reconciliation cycle and dropped at its end.
#[derive(Debug, Clone)]
pub struct CycleState {
    pub cycle_id: Uuid,
    /// Taken before the first pack transfer; actives minted earlier belong
    /// to another cycle.
    pub started_at: TimeMs,
    pub packs: Vec<AssetId>,
    /// Parallel to the order in which packs were transferred successfully.
    pub senders: Vec<AccountName>,
    pub observed_actives: Vec<AssetId>,
    pub matched: MatchedActives,
    pub poll: Option<PollOutcome>,
}

impl CycleState {
    pub fn new(packs: Vec<AssetId>) -> Self {
        CycleState {
            cycle_id: Uuid::new_v4(),
            started_at: TimeMs::now(),
            packs,
            senders: Vec::new(),
            observed_actives: Vec::new(),
            matched: MatchedActives::new(),
            poll: None,
        }
    }

    /// Expected number of actives: one per successfully transferred pack.
    pub fn expected_actives(&self) -> usize {
        self.senders.len()
    }
}
