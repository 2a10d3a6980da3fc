//! Append-only generation history backed by SQLite.
//!
//! Every completed request produces exactly one [`GenerationRecord`]. Records
//! are never updated or deleted. `raw_content` always holds the caller's
//! original, unmasked input.

use crate::error::{Result, VersaError};
use crate::prompt::TaskType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// A persisted generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRecord {
    pub id: String,
    pub task_type: TaskType,
    pub raw_content: String,
    pub generated_result: String,
    pub created_at: DateTime<Utc>,
}

/// Input for [`HistoryStore::append`]; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewGeneration {
    pub task_type: TaskType,
    pub raw_content: String,
    pub generated_result: String,
}

/// A history entry as returned to clients.
///
/// `generated_result` is the stored text decoded as JSON when it parses,
/// otherwise the stored string. Records written before output normalization
/// existed may hold JSON documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub task_type: TaskType,
    pub raw_content: String,
    pub generated_result: Value,
    pub created_at: DateTime<Utc>,
}

impl From<GenerationRecord> for HistoryEntry {
    fn from(record: GenerationRecord) -> Self {
        let generated_result = serde_json::from_str::<Value>(&record.generated_result)
            .unwrap_or(Value::String(record.generated_result));
        HistoryEntry {
            id: record.id,
            task_type: record.task_type,
            raw_content: record.raw_content,
            generated_result,
            created_at: record.created_at,
        }
    }
}

/// Persistence seam for generation history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist one generation atomically and return the stored record.
    async fn append(&self, entry: NewGeneration) -> Result<GenerationRecord>;

    /// All records, newest first.
    async fn list(&self) -> Result<Vec<GenerationRecord>>;
}

#[derive(sqlx::FromRow)]
struct GenerationRow {
    id: String,
    task_type: String,
    raw_content: String,
    generated_result: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<GenerationRow> for GenerationRecord {
    type Error = VersaError;

    fn try_from(row: GenerationRow) -> Result<Self> {
        let task_type = row.task_type.parse::<TaskType>().map_err(|_| {
            VersaError::Database(sqlx::Error::Decode(
                format!("unknown task_type in history: {}", row.task_type).into(),
            ))
        })?;
        Ok(GenerationRecord {
            id: row.id,
            task_type,
            raw_content: row.raw_content,
            generated_result: row.generated_result,
            created_at: row.created_at,
        })
    }
}

/// [`HistoryStore`] on a sqlx SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    /// Connect to `database_url` (created if missing) and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        debug!("Opening history database at {}", database_url);
        let options = SqliteConnectOptions::from_str(database_url)?
            .pragma("journal_mode", "WAL")
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// A private in-memory database, for tests and ephemeral runs.
    ///
    /// Uses a single long-lived connection: every SQLite `:memory:`
    /// connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, entry: NewGeneration) -> Result<GenerationRecord> {
        let record = GenerationRecord {
            id: Uuid::new_v4().to_string(),
            task_type: entry.task_type,
            raw_content: entry.raw_content,
            generated_result: entry.generated_result,
            created_at: Utc::now(),
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO generation_history (id, task_type, raw_content, generated_result, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.task_type.as_str())
        .bind(&record.raw_content)
        .bind(&record.generated_result)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(id = %record.id, task_type = %record.task_type, "generation persisted");
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<GenerationRecord>> {
        let rows: Vec<GenerationRow> = sqlx::query_as(
            r#"
            SELECT id, task_type, raw_content, generated_result, created_at
            FROM generation_history
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(GenerationRecord::try_from).collect()
    }
}
