//! The reconciliation cycle: collect, dispatch, poll, match, group, return.

use std::time::Duration;

pub mod collector;
pub mod cycle;
pub mod dispatcher;
pub mod matcher;
pub mod poller;
pub mod returner;

pub use collector::PackCollector;
pub use cycle::{CycleError, CycleReport, CycleSettings, PackOpener, ReplayReport};
pub use dispatcher::{DispatchReport, TransferDispatcher};
pub use matcher::SourceMatcher;
pub use poller::{ConvergencePoller, PollResult};
pub use returner::{FailedBatch, ReturnExecutor, ReturnReport};

/// Cooperative wait between rate-limited calls. Zero means no yield point.
pub(crate) async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
