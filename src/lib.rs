pub mod bots;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod ledger;
pub mod market;
pub mod orchestration;

pub use config::{BotMode, Config};
pub use db::{init_db, Repository};
pub use domain::{AccountName, Asset, AssetId, Decimal, TemplateId, TimeMs};
pub use error::AppError;
pub use indexer::{AssetFilter, AtomicIndexer, Indexer, IndexerError, MockIndexer};
pub use ledger::{ActionSubmitter, CommandSubmitter, MockSubmitter, SubmitError};
pub use market::Gateway;
pub use orchestration::{CycleReport, PackOpener};
