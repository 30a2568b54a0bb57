use crate::bots::{BotError, StoreError};
use crate::config::ConfigError;
use crate::indexer::IndexerError;
use crate::ledger::SubmitError;
use crate::orchestration::CycleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Journal error: {0}")]
    Journal(#[from] sqlx::Error),
    #[error(transparent)]
    Indexer(#[from] IndexerError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Cycle(#[from] CycleError),
    #[error(transparent)]
    Bot(#[from] BotError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Indexer(e) => e.is_transient(),
            AppError::Submit(e) => e.is_transient(),
            AppError::Bot(e) => e.is_transient(),
            AppError::Config(_)
            | AppError::Journal(_)
            | AppError::Cycle(_)
            | AppError::Store(_) => false,
        }
    }
}
