use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ArticleRecord;

/// Keyed article collection with a uniqueness constraint on `link`.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    async fn exists(&self, link: &str) -> Result<bool>;

    /// Inserts every record it can. A failing record never stops the rest
    /// of the batch.
    async fn insert_many(&self, records: Vec<ArticleRecord>) -> Result<InsertReport>;

    /// Newest first by `ingested_at`.
    async fn find_recent(&self, limit: usize) -> Result<Vec<ArticleRecord>>;

    async fn scan_all(&self) -> Result<Vec<ArticleRecord>>;
}

#[derive(Debug, Default)]
pub struct InsertReport {
    pub inserted: Vec<String>,
    pub failed: Vec<FailedInsert>,
}

impl InsertReport {
    pub fn duplicate_count(&self) -> usize {
        self.failed
            .iter()
            .filter(|f| f.reason == InsertFailure::DuplicateKey)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedInsert {
    pub link: String,
    pub reason: InsertFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertFailure {
    /// Another record with the same link is already stored.
    DuplicateKey,
    Rejected(String),
}

impl fmt::Display for InsertFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertFailure::DuplicateKey => write!(f, "duplicate link"),
            InsertFailure::Rejected(reason) => write!(f, "{}", reason),
        }
    }
}
