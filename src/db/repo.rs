//! Repository layer for the cycle journal.

use crate::domain::{AccountName, AssetId};
use crate::engine::Batch;
use crate::orchestration::{CycleReport, FailedBatch};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::warn;
use uuid::Uuid;

/// Repository for journal operations.
#[derive(Debug)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Record the summary of a finished cycle. Re-recording a cycle id replaces it.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn record_cycle(&self, report: &CycleReport) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO cycles (
                cycle_id, status, packs_found, packs_dispatched, actives_observed,
                actives_matched, poll_outcome, poll_attempts, batches_submitted,
                batches_failed, error, started_at, finished_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(report.cycle_id.to_string())
        .bind(report.status())
        .bind(report.packs_found as i64)
        .bind(report.senders.len() as i64)
        .bind(report.actives_observed as i64)
        .bind(report.matched.len() as i64)
        .bind(report.poll.map(|p| p.as_str()))
        .bind(report.poll.map(|p| p.attempts() as i64))
        .bind(report.batches_submitted as i64)
        .bind(report.failed.len() as i64)
        .bind(report.started_at.as_ms())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record a cycle that stopped at `stage`; its status is `{stage}_failed`.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn record_cycle_failure(
        &self,
        cycle_id: Uuid,
        stage: &str,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO cycles (cycle_id, status, error, started_at, finished_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(cycle_id.to_string())
        .bind(format!("{}_failed", stage))
        .bind(error)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Journal a batch the ledger rejected.
    ///
    /// Returns false when a batch with the same fingerprint is already journaled.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn record_failed_batch(
        &self,
        cycle_id: Uuid,
        failed: &FailedBatch,
    ) -> Result<bool, sqlx::Error> {
        let asset_ids = serde_json::to_string(&failed.batch.asset_ids)
            .map_err(|e| sqlx::Error::Protocol(format!("asset id list not encodable: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO failed_returns (
                fingerprint, cycle_id, recipient, asset_ids, error, attempts, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(fingerprint) DO NOTHING
            "#,
        )
        .bind(failed.fingerprint())
        .bind(cycle_id.to_string())
        .bind(failed.batch.recipient.as_str())
        .bind(asset_ids)
        .bind(failed.error.as_str())
        .bind(failed.attempts as i64)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Failed batches not yet resolved, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn unresolved_failed_batches(&self) -> Result<Vec<FailedBatch>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT fingerprint, recipient, asset_ids, error, attempts
            FROM failed_returns
            WHERE resolved_at IS NULL
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut batches = Vec::with_capacity(rows.len());
        for row in rows {
            let fingerprint: String = row.get("fingerprint");
            let raw_ids: String = row.get("asset_ids");
            let asset_ids: Vec<AssetId> = match serde_json::from_str(&raw_ids) {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(fingerprint = %fingerprint, error = %e, "Unreadable journaled batch skipped");
                    continue;
                }
            };
            let attempts: i64 = row.get("attempts");

            batches.push(FailedBatch {
                batch: Batch::new(AccountName::new(row.get::<String, _>("recipient")), asset_ids),
                error: row.get("error"),
                attempts: attempts as u32,
            });
        }

        Ok(batches)
    }

    /// Returns false when no unresolved batch has this fingerprint.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_batch_resolved(&self, fingerprint: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE failed_returns SET resolved_at = ? WHERE fingerprint = ? AND resolved_at IS NULL",
        )
        .bind(chrono::Utc::now().timestamp_millis())
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn cycle_count(&self) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cycles")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Status of a journaled cycle, if any.
    pub async fn cycle_status(&self, cycle_id: Uuid) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT status FROM cycles WHERE cycle_id = ?")
            .bind(cycle_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::{PollOutcome, TimeMs};
    use tempfile::TempDir;

    async fn setup_repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("journal.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn failed(recipient: &str, ids: &[&str]) -> FailedBatch {
        FailedBatch {
            batch: Batch::new(
                AccountName::new(recipient),
                ids.iter().map(|s| AssetId::new(*s)).collect(),
            ),
            error: "rejected".to_string(),
            attempts: 1,
        }
    }

    #[tokio::test]
    async fn records_cycle_summary() {
        let (repo, _tmp) = setup_repo().await;
        let report = CycleReport {
            cycle_id: Uuid::new_v4(),
            started_at: TimeMs::new(1_000),
            packs_found: 3,
            senders: vec![AccountName::new("alice"); 3],
            actives_observed: 3,
            matched: vec![AssetId::new("a1"), AssetId::new("a2"), AssetId::new("a3")],
            poll: Some(PollOutcome::Converged { attempts: 1 }),
            batches_submitted: 1,
            assets_returned: 3,
            failed: vec![],
        };

        repo.record_cycle(&report).await.unwrap();
        repo.record_cycle(&report).await.unwrap();

        assert_eq!(repo.cycle_count().await.unwrap(), 1);
        assert_eq!(
            repo.cycle_status(report.cycle_id).await.unwrap().as_deref(),
            Some("completed")
        );
    }

    #[tokio::test]
    async fn failure_status_names_the_stage() {
        let (repo, _tmp) = setup_repo().await;
        let id = Uuid::new_v4();
        repo.record_cycle_failure(id, "grouping", "cannot pair 3 with 4")
            .await
            .unwrap();
        assert_eq!(
            repo.cycle_status(id).await.unwrap().as_deref(),
            Some("grouping_failed")
        );
    }

    #[tokio::test]
    async fn failed_batch_is_idempotent_on_fingerprint() {
        let (repo, _tmp) = setup_repo().await;
        let batch = failed("alice", &["1", "2"]);

        assert!(repo.record_failed_batch(Uuid::new_v4(), &batch).await.unwrap());
        assert!(!repo.record_failed_batch(Uuid::new_v4(), &batch).await.unwrap());

        let pending = repo.unresolved_failed_batches().await.unwrap();
        assert_eq!(pending, vec![batch]);
    }

    #[tokio::test]
    async fn resolved_batches_are_not_replayed() {
        let (repo, _tmp) = setup_repo().await;
        let a = failed("alice", &["1"]);
        let b = failed("bob", &["2"]);
        let cycle = Uuid::new_v4();
        repo.record_failed_batch(cycle, &a).await.unwrap();
        repo.record_failed_batch(cycle, &b).await.unwrap();

        assert!(repo.mark_batch_resolved(&a.fingerprint()).await.unwrap());
        assert!(!repo.mark_batch_resolved(&a.fingerprint()).await.unwrap());

        let pending = repo.unresolved_failed_batches().await.unwrap();
        assert_eq!(pending, vec![b]);
    }
}
