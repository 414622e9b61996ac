use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use super::{
    Category, Correctness, DecisionEntry, DecisionStore, JournalStore, OutcomeRecord,
    Reversibility, TimePressure,
};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult, ValidationError};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed journal storage
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory instance (single connection, lives as long as the pool)
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Fixed-width UTC form, so text comparison in SQL matches time order.
fn encode_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(column: &str, raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Query {
            message: format!("Invalid {} '{}': {}", column, raw, e),
        })
}

fn decode_enum<T: FromStr>(column: &str, raw: &str) -> StorageResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| StorageError::Query {
        message: format!("Invalid {} '{}': {}", column, raw, e),
    })
}

#[async_trait]
impl DecisionStore for SqliteStorage {
    async fn entries_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<DecisionEntry>> {
        let start = encode_time(&start);
        let end = encode_time(&end);

        // One transaction so decisions and lessons come from the same snapshot
        let mut tx = self.pool.begin().await?;

        let rows: Vec<DecisionRow> = sqlx::query_as(
            r#"
            SELECT id, decided_at, title, category, confidence, expected_outcome, context,
                   reasoning, tags, time_pressure, reversibility, information_completeness
            FROM decisions
            WHERE decided_at >= ? AND decided_at < ?
            ORDER BY decided_at ASC, id ASC
            "#,
        )
        .bind(&start)
        .bind(&end)
        .fetch_all(&mut *tx)
        .await?;

        let lesson_rows: Vec<LessonRow> = sqlx::query_as(
            r#"
            SELECT l.decision_id, l.lesson
            FROM decision_lessons l
            JOIN decisions d ON d.id = l.decision_id
            WHERE d.decided_at >= ? AND d.decided_at < ?
            ORDER BY l.id ASC
            "#,
        )
        .bind(&start)
        .bind(&end)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut lessons: HashMap<String, Vec<String>> = HashMap::new();
        for row in lesson_rows {
            lessons.entry(row.decision_id).or_default().push(row.lesson);
        }

        let entries = rows
            .into_iter()
            .map(|row| {
                let mut entry = DecisionEntry::try_from(row)?;
                entry.lessons = lessons.remove(&entry.id).unwrap_or_default();
                Ok(entry)
            })
            .collect::<StorageResult<Vec<_>>>()?;

        debug!(count = entries.len(), start = %start, end = %end, "Loaded decisions in range");
        Ok(entries)
    }

    async fn outcome_for(&self, decision_id: &str) -> StorageResult<Option<OutcomeRecord>> {
        let row: Option<OutcomeRow> = sqlx::query_as(
            r#"
            SELECT id, decision_id, actual_outcome, outcome_quality, process_quality,
                   correct, resolved_at, notes
            FROM outcomes
            WHERE decision_id = ?
            "#,
        )
        .bind(decision_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OutcomeRecord::try_from).transpose()
    }
}

#[async_trait]
impl JournalStore for SqliteStorage {
    async fn record_decision(&self, entry: &DecisionEntry) -> StorageResult<()> {
        entry.validate()?;

        let tags = serde_json::to_string(&entry.tags).map_err(|e| StorageError::Query {
            message: format!("Failed to encode tags: {}", e),
        })?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO decisions (id, decided_at, title, category, confidence, expected_outcome,
                                   context, reasoning, tags, time_pressure, reversibility,
                                   information_completeness)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(encode_time(&entry.timestamp))
        .bind(&entry.title)
        .bind(entry.category.to_string())
        .bind(entry.confidence)
        .bind(&entry.expected_outcome)
        .bind(&entry.context)
        .bind(&entry.reasoning)
        .bind(&tags)
        .bind(entry.time_pressure.to_string())
        .bind(entry.reversibility.to_string())
        .bind(entry.information_completeness.map(i64::from))
        .execute(&mut *tx)
        .await?;

        for lesson in &entry.lessons {
            insert_lesson(&mut tx, &entry.id, lesson).await?;
        }

        tx.commit().await?;

        info!(decision_id = %entry.id, category = %entry.category, "Decision recorded");
        Ok(())
    }

    async fn record_outcome(&self, outcome: &OutcomeRecord) -> StorageResult<()> {
        let entry = self.get_decision(&outcome.decision_id).await?.ok_or_else(|| {
            ValidationError::UnknownDecision {
                decision_id: outcome.decision_id.clone(),
            }
        })?;
        outcome.validate_against(&entry)?;

        let result = sqlx::query(
            r#"
            INSERT INTO outcomes (id, decision_id, actual_outcome, outcome_quality,
                                  process_quality, correct, resolved_at, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&outcome.id)
        .bind(&outcome.decision_id)
        .bind(&outcome.actual_outcome)
        .bind(i64::from(outcome.outcome_quality))
        .bind(i64::from(outcome.process_quality))
        .bind(outcome.correct.to_string())
        .bind(encode_time(&outcome.resolved_at))
        .bind(&outcome.notes)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!(
                    decision_id = %outcome.decision_id,
                    correct = %outcome.correct,
                    "Outcome recorded"
                );
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(ValidationError::OutcomeAlreadyRecorded {
                    decision_id: outcome.decision_id.clone(),
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn append_lesson(&self, decision_id: &str, lesson: &str) -> StorageResult<()> {
        let lesson = lesson.trim();
        if lesson.is_empty() {
            return Err(ValidationError::EmptyField { field: "lesson" }.into());
        }

        let mut tx = self.pool.begin().await?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM decisions WHERE id = ?")
            .bind(decision_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StorageError::DecisionNotFound {
                decision_id: decision_id.to_string(),
            });
        }

        insert_lesson(&mut tx, decision_id, lesson).await?;
        tx.commit().await?;

        debug!(decision_id = %decision_id, "Lesson appended");
        Ok(())
    }

    async fn get_decision(&self, id: &str) -> StorageResult<Option<DecisionEntry>> {
        let row: Option<DecisionRow> = sqlx::query_as(
            r#"
            SELECT id, decided_at, title, category, confidence, expected_outcome, context,
                   reasoning, tags, time_pressure, reversibility, information_completeness
            FROM decisions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut entry = DecisionEntry::try_from(row)?;
        entry.lessons = sqlx::query_scalar::<_, String>(
            "SELECT lesson FROM decision_lessons WHERE decision_id = ? ORDER BY id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(entry))
    }
}

async fn insert_lesson(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    decision_id: &str,
    lesson: &str,
) -> StorageResult<()> {
    sqlx::query("INSERT INTO decision_lessons (decision_id, lesson, created_at) VALUES (?, ?, ?)")
        .bind(decision_id)
        .bind(lesson)
        .bind(encode_time(&Utc::now()))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct DecisionRow {
    id: String,
    decided_at: String,
    title: String,
    category: String,
    confidence: Option<f64>,
    expected_outcome: String,
    context: Option<String>,
    reasoning: Option<String>,
    tags: String,
    time_pressure: String,
    reversibility: String,
    information_completeness: Option<i64>,
}

impl TryFrom<DecisionRow> for DecisionEntry {
    type Error = StorageError;

    fn try_from(row: DecisionRow) -> Result<Self, Self::Error> {
        let tags: BTreeSet<String> =
            serde_json::from_str(&row.tags).map_err(|e| StorageError::Query {
                message: format!("Invalid tags for decision {}: {}", row.id, e),
            })?;

        let information_completeness = row
            .information_completeness
            .map(|v| {
                u8::try_from(v).map_err(|_| ValidationError::InformationOutOfRange {
                    decision_id: row.id.clone(),
                    value: v,
                })
            })
            .transpose()?;

        Ok(Self {
            timestamp: decode_time("decided_at", &row.decided_at)?,
            category: row.category.parse::<Category>()?,
            time_pressure: decode_enum::<TimePressure>("time_pressure", &row.time_pressure)?,
            reversibility: decode_enum::<Reversibility>("reversibility", &row.reversibility)?,
            id: row.id,
            title: row.title,
            confidence: row.confidence,
            expected_outcome: row.expected_outcome,
            context: row.context,
            reasoning: row.reasoning,
            tags,
            information_completeness,
            lessons: Vec::new(),
        })
    }
}

#[derive(sqlx::FromRow)]
struct OutcomeRow {
    id: String,
    decision_id: String,
    actual_outcome: String,
    outcome_quality: i64,
    process_quality: i64,
    correct: String,
    resolved_at: String,
    notes: Option<String>,
}

impl TryFrom<OutcomeRow> for OutcomeRecord {
    type Error = StorageError;

    fn try_from(row: OutcomeRow) -> Result<Self, Self::Error> {
        let quality = |field: &'static str, value: i64| {
            u8::try_from(value).map_err(|_| ValidationError::QualityOutOfRange { field, value })
        };

        Ok(Self {
            outcome_quality: quality("outcome_quality", row.outcome_quality)?,
            process_quality: quality("process_quality", row.process_quality)?,
            correct: decode_enum::<Correctness>("correct", &row.correct)?,
            resolved_at: decode_time("resolved_at", &row.resolved_at)?,
            id: row.id,
            decision_id: row.decision_id,
            actual_outcome: row.actual_outcome,
            notes: row.notes,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LessonRow {
    decision_id: String,
    lesson: String,
}
