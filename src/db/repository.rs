use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, ErrorCode, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::ArticleRecord;

use super::schema::{SCHEMA, UNIQUE_LINK_INDEX};
use super::store::{CorpusStore, FailedInsert, InsertFailure, InsertReport};

const ARTICLE_COLUMNS: &str =
    "source, title, link, published_date, category, content, ingested_at";

/// SQLite-backed corpus store.
pub struct Repository {
    conn: Connection,
    uniqueness_enforced: bool,
}

impl Repository {
    /// Opens the store and verifies the connection. Any failure here is fatal
    /// for the caller.
    pub async fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .await
            .map_err(|e| AppError::StoreConnection(format!("{}: {}", db_path, e)))?;
        Self::init(conn).await
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| AppError::StoreConnection(e.to_string()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::StoreConnection(e.to_string()))?;

        let uniqueness_enforced = match conn
            .call(|conn| {
                conn.execute_batch(UNIQUE_LINK_INDEX)?;
                Ok(())
            })
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Could not create unique index on link; duplicates are only caught by existence checks"
                );
                false
            }
        };

        Ok(Self {
            conn,
            uniqueness_enforced,
        })
    }

    /// Whether the unique index on `link` is in place.
    pub fn uniqueness_enforced(&self) -> bool {
        self.uniqueness_enforced
    }

    pub async fn count(&self) -> Result<u64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl CorpusStore for Repository {
    async fn exists(&self, link: &str) -> Result<bool> {
        let link = link.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM articles WHERE link = ?1",
                    params![link],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    async fn insert_many(&self, records: Vec<ArticleRecord>) -> Result<InsertReport> {
        if records.is_empty() {
            return Ok(InsertReport::default());
        }

        let report = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut report = InsertReport::default();
                {
                    let mut stmt = tx.prepare(&format!(
                        "INSERT INTO articles ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        ARTICLE_COLUMNS
                    ))?;
                    for record in records {
                        let outcome = stmt.execute(params![
                            record.source,
                            record.title,
                            record.link,
                            record.published_date,
                            record.category,
                            record.content,
                            format_timestamp(&record.ingested_at),
                        ]);
                        match outcome {
                            Ok(_) => report.inserted.push(record.link),
                            Err(e) => report.failed.push(FailedInsert {
                                reason: classify_insert_error(&e),
                                link: record.link,
                            }),
                        }
                    }
                }
                tx.commit()?;
                Ok(report)
            })
            .await?;
        Ok(report)
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<ArticleRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM articles ORDER BY ingested_at DESC, id DESC LIMIT ?1",
                    ARTICLE_COLUMNS
                ))?;
                let records = stmt
                    .query_map(params![limit], record_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await?;
        Ok(records)
    }

    async fn scan_all(&self) -> Result<Vec<ArticleRecord>> {
        let records = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM articles ORDER BY id",
                    ARTICLE_COLUMNS
                ))?;
                let records = stmt
                    .query_map([], record_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await?;
        Ok(records)
    }
}

fn classify_insert_error(err: &rusqlite::Error) -> InsertFailure {
    match err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            InsertFailure::DuplicateKey
        }
        other => InsertFailure::Rejected(other.to_string()),
    }
}

// Fixed width so that text order in SQLite matches time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn record_from_row(row: &Row) -> rusqlite::Result<ArticleRecord> {
    let ingested_at: String = row.get(6)?;
    let ingested_at = parse_datetime(&ingested_at).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Text,
            format!("invalid ingested_at timestamp {:?}", ingested_at).into(),
        )
    })?;

    Ok(ArticleRecord {
        source: row.get(0)?,
        title: row.get(1)?,
        link: row.get(2)?,
        published_date: row.get(3)?,
        category: row.get(4)?,
        content: row.get(5)?,
        ingested_at,
    })
}
