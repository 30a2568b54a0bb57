use anyhow::Context;
use packrelay::bots::{self, BuyerBot, BuyerSettings, TrackedFile};
use packrelay::orchestration::CycleSettings;
use packrelay::{
    config::Config, db::init_db, AppError, AtomicIndexer, BotMode, CommandSubmitter, Gateway,
    PackOpener, Repository,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let indexer = Arc::new(AtomicIndexer::new(
        config.indexer_api_url.clone(),
        config.chain_api_url.clone(),
    ));
    let submitter = Arc::new(
        CommandSubmitter::from_command_line(&config.signer_command)
            .context("invalid SIGNER_COMMAND")?,
    );
    let gateway = Gateway::new(indexer, submitter);

    tracing::info!(
        mode = ?config.bot_mode,
        operator = %config.operator_account,
        "Starting"
    );

    let result = match config.bot_mode {
        BotMode::PackOpener => run_pack_opener(&config, gateway).await,
        BotMode::Undercut => run_undercut(&config, gateway).await,
        BotMode::Buyer => run_buyer(&config, gateway).await,
    };

    if let Err(e) = result {
        let transient = e.is_transient();
        tracing::error!(error = %e, transient, "Stopped");
        // 75 is EX_TEMPFAIL: a supervisor may restart us.
        std::process::exit(if transient { 75 } else { 1 });
    }
    Ok(())
}

async fn run_pack_opener(config: &Config, gateway: Gateway) -> Result<(), AppError> {
    let mut opener = PackOpener::new(CycleSettings::from(config), gateway);

    if let Some(path) = &config.database_path {
        let pool = init_db(path).await?;
        opener = opener.with_journal(Arc::new(Repository::new(pool)));
    }

    opener.run_forever().await;
    Ok(())
}

async fn run_undercut(config: &Config, gateway: Gateway) -> Result<(), AppError> {
    let file = TrackedFile::load(&config.tracked_assets_file)?;
    let (store, store_task) = bots::spawn_store(config.tracked_assets_file.clone(), file.clone());

    let results = bots::run_undercut_bots(gateway, &file, store, Duration::from_secs(1)).await;
    let failed = results.iter().filter(|r| r.is_err()).count();
    tracing::info!(bots = results.len(), failed, "All undercut bots finished");

    // Every handle is dropped once the bots are done; the store drains and exits.
    let _ = store_task.await;
    Ok(())
}

async fn run_buyer(config: &Config, gateway: Gateway) -> Result<(), AppError> {
    let target = config
        .buy_target
        .clone()
        .ok_or_else(|| packrelay::config::ConfigError::MissingEnv("BUY_TEMPLATE_ID".to_string()))?;

    let mut settings = BuyerSettings::new(config.operator_account.clone(), target);
    settings.rate_limit = config.rate_limit;
    settings.balance_refresh = config.balance_refresh;

    BuyerBot::start(gateway, settings).await?.run().await;
    Ok(())
}
