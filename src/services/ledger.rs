//! src/services/ledger.rs
//!
//! Optional SQLite record of organizer runs: one row per run, one per product
//! outcome and one per uploaded object. The ledger is write-only from the
//! pipeline's point of view and never influences what gets processed.

use crate::{
    models::{file_entry::ProductId, verdict::ValidationVerdict},
    services::{organizer::RunStats, storage_sink::StoredObject},
};
use chrono::{DateTime, Utc};
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{io, path::Path, str::FromStr, sync::Arc};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("encoding issues: {0}")]
    Json(#[from] serde_json::Error),
    #[error("run `{0}` not found")]
    RunNotFound(Uuid),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// A recorded run, as stored.
#[derive(Debug, Clone, FromRow)]
pub struct RunRow {
    pub id: Uuid,
    pub source_dir: String,
    pub output_dir: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub warned: i64,
    pub uploaded: i64,
}

/// A recorded product outcome, as stored.
#[derive(Debug, Clone, FromRow)]
pub struct OutcomeRow {
    pub product_id: String,
    pub passed: bool,
    /// JSON array of issue objects.
    pub issues: String,
    pub folder: Option<String>,
    pub uploaded_files: i64,
    pub failed_uploads: i64,
    pub error: Option<String>,
}

/// Outcome of one product, as handed to [`Ledger::record_outcome`].
#[derive(Debug, Clone, Copy)]
pub struct OutcomeEntry<'a> {
    pub id: &'a ProductId,
    pub verdict: &'a ValidationVerdict,
    pub folder: Option<&'a Path>,
    pub uploaded: &'a [StoredObject],
    pub failed_uploads: usize,
    pub error: Option<&'a str>,
}

#[derive(Clone)]
pub struct Ledger {
    db: Arc<SqlitePool>,
}

impl Ledger {
    /// Open (creating if needed) the SQLite database at `url` and apply the schema.
    pub async fn connect(url: &str) -> LedgerResult<Self> {
        let db_path = url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:")
            .trim_start_matches("file:");
        let in_memory = db_path.starts_with(":memory:") || db_path.contains("mode=memory");
        if !in_memory {
            let file_path = Path::new(db_path.split('?').next().unwrap_or(db_path));
            if let Some(parent) = file_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                    debug!("ensured ledger directory {:?}", parent);
                }
            }
        }

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // a single connection keeps `sqlite::memory:` on one database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let ledger = Self { db: Arc::new(pool) };
        ledger.migrate().await?;
        Ok(ledger)
    }

    async fn migrate(&self) -> LedgerResult<()> {
        let statements = INIT_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty());
        for stmt in statements {
            debug!("executing ledger migration: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Open a run row and return its id.
    pub async fn begin_run(&self, source_dir: &Path, output_dir: &Path) -> LedgerResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO runs (id, source_dir, output_dir, started_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(source_dir.display().to_string())
        .bind(output_dir.display().to_string())
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;
        Ok(id)
    }

    /// Store one product outcome together with its uploaded objects.
    pub async fn record_outcome(&self, run_id: Uuid, entry: OutcomeEntry<'_>) -> LedgerResult<()> {
        let now = Utc::now();
        let issues = serde_json::to_string(&entry.verdict.issues)?;
        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO product_outcomes (
                id, run_id, product_id, passed, issues, folder,
                uploaded_files, failed_uploads, error, recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(run_id)
        .bind(entry.id.as_str())
        .bind(entry.verdict.passed())
        .bind(issues)
        .bind(entry.folder.map(|p| p.display().to_string()))
        .bind(entry.uploaded.len() as i64)
        .bind(entry.failed_uploads as i64)
        .bind(entry.error)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for object in entry.uploaded {
            sqlx::query(
                "INSERT INTO uploads (id, run_id, product_id, key, etag, size_bytes, uploaded_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4())
            .bind(run_id)
            .bind(entry.id.as_str())
            .bind(&object.key)
            .bind(&object.etag)
            .bind(object.size_bytes as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Close a run with its final statistics.
    pub async fn finish_run(&self, run_id: Uuid, stats: &RunStats) -> LedgerResult<()> {
        let result = sqlx::query(
            "UPDATE runs SET finished_at = ?, total = ?, succeeded = ?, failed = ?,
                    warned = ?, uploaded = ?
             WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(stats.total as i64)
        .bind(stats.succeeded as i64)
        .bind(stats.failed as i64)
        .bind(stats.warned as i64)
        .bind(stats.uploaded as i64)
        .bind(run_id)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::RunNotFound(run_id));
        }
        Ok(())
    }

    pub async fn run(&self, run_id: Uuid) -> LedgerResult<RunRow> {
        sqlx::query_as::<_, RunRow>(
            "SELECT id, source_dir, output_dir, started_at, finished_at,
                    total, succeeded, failed, warned, uploaded
             FROM runs WHERE id = ?",
        )
        .bind(run_id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => LedgerError::RunNotFound(run_id),
            other => LedgerError::Sqlx(other),
        })
    }

    /// Most recent runs first.
    pub async fn recent_runs(&self, limit: usize) -> LedgerResult<Vec<RunRow>> {
        Ok(sqlx::query_as::<_, RunRow>(
            "SELECT id, source_dir, output_dir, started_at, finished_at,
                    total, succeeded, failed, warned, uploaded
             FROM runs ORDER BY started_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&*self.db)
        .await?)
    }

    /// Outcomes of a run, ordered by product id.
    pub async fn outcomes(&self, run_id: Uuid) -> LedgerResult<Vec<OutcomeRow>> {
        Ok(sqlx::query_as::<_, OutcomeRow>(
            "SELECT product_id, passed, issues, folder, uploaded_files, failed_uploads, error
             FROM product_outcomes WHERE run_id = ? ORDER BY product_id ASC",
        )
        .bind(run_id)
        .fetch_all(&*self.db)
        .await?)
    }

    /// Keys uploaded during a run, in key order.
    pub async fn uploaded_keys(&self, run_id: Uuid) -> LedgerResult<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT key FROM uploads WHERE run_id = ? ORDER BY key ASC",
        )
        .bind(run_id)
        .fetch_all(&*self.db)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::verdict::Issue;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn records_a_run_with_outcomes_and_uploads() {
        let ledger = Ledger::connect("sqlite::memory:").await.unwrap();
        let run_id = ledger
            .begin_run(Path::new("/raw"), Path::new("/out"))
            .await
            .unwrap();

        let passing = ValidationVerdict {
            issues: vec![Issue::warning("only 2 texture(s) found (need 3)")],
        };
        let failing = ValidationVerdict {
            issues: vec![Issue::error("missing binary glTF file")],
        };
        let uploaded = vec![StoredObject {
            key: "products/A/A.zip".into(),
            etag: "abc".into(),
            size_bytes: 3,
        }];

        ledger
            .record_outcome(
                run_id,
                OutcomeEntry {
                    id: &ProductId::new("A"),
                    verdict: &passing,
                    folder: Some(Path::new("/out/A")),
                    uploaded: &uploaded,
                    failed_uploads: 0,
                    error: None,
                },
            )
            .await
            .unwrap();
        ledger
            .record_outcome(
                run_id,
                OutcomeEntry {
                    id: &ProductId::new("B"),
                    verdict: &failing,
                    folder: None,
                    uploaded: &[],
                    failed_uploads: 0,
                    error: None,
                },
            )
            .await
            .unwrap();

        let stats = RunStats {
            total: 2,
            succeeded: 1,
            failed: 1,
            warned: 1,
            uploaded: 1,
        };
        ledger.finish_run(run_id, &stats).await.unwrap();

        let run = ledger.run(run_id).await.unwrap();
        assert_eq!(run.source_dir, "/raw");
        let recent = ledger.recent_runs(5).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, run_id);
        assert_eq!((run.total, run.succeeded, run.failed), (2, 1, 1));
        assert!(run.finished_at.is_some());

        let outcomes = ledger.outcomes(run_id).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].passed);
        assert_eq!(outcomes[0].folder.as_deref(), Some("/out/A"));
        assert_eq!(outcomes[0].uploaded_files, 1);
        assert!(!outcomes[1].passed);
        assert!(outcomes[1].issues.contains("missing binary glTF file"));

        assert_eq!(
            ledger.uploaded_keys(run_id).await.unwrap(),
            vec!["products/A/A.zip"]
        );
    }

    #[tokio::test]
    async fn finishing_unknown_run_fails() {
        let ledger = Ledger::connect("sqlite::memory:").await.unwrap();
        let err = ledger
            .finish_run(Uuid::new_v4(), &RunStats::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::RunNotFound(_)));
    }

    #[tokio::test]
    async fn creates_database_file_and_parent_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("meta/ledger.db");
        let url = format!("sqlite://{}", path.display());

        let ledger = Ledger::connect(&url).await.unwrap();
        ledger
            .begin_run(Path::new("/raw"), Path::new("/out"))
            .await
            .unwrap();

        assert!(path.is_file());
    }
}
