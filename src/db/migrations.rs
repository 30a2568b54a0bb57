//! Journal initialization: connection options and versioned schema scripts.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Schema scripts in application order. `PRAGMA user_version` holds how many
/// of them the file has already seen.
const MIGRATIONS: &[&str] = &[include_str!("schema.sql")];

/// Open or create the journal file and bring its schema up to date.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    let path = Path::new(db_path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).ok();
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    // One writer (the cycle loop) plus a spare for replay at start-up.
    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await?;

    let version = run_migrations(&pool).await?;
    info!(path = db_path, schema_version = version, "Journal opened");
    Ok(pool)
}

/// Apply every script past the stored version, each in its own transaction.
/// Returns the resulting schema version.
async fn run_migrations(pool: &SqlitePool) -> Result<usize, sqlx::Error> {
    let (stored,): (i64,) = sqlx::query_as("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    let applied = usize::try_from(stored).unwrap_or(0);

    for (index, script) in MIGRATIONS.iter().enumerate().skip(applied) {
        let version = index + 1;
        let mut tx = pool.begin().await?;
        for statement in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        // PRAGMA arguments cannot be bound.
        sqlx::query(&format!("PRAGMA user_version = {}", version))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(version, "Journal schema script applied");
    }

    Ok(MIGRATIONS.len().max(applied))
}
