//! Pure computation used by the reconciliation cycle and the bots.

pub mod grouper;
pub mod pricing;
pub mod provenance;
pub mod retry;

pub use grouper::{group_transactions, Batch, GroupingError, TransactionGroup, MAX_GROUP_SIZE};
pub use pricing::{undercut_price, BelowMinimum};
pub use provenance::{classify, Provenance};
pub use retry::{doubling_backoff, ErrorStreak};
