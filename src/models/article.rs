use chrono::{DateTime, Utc};

/// Category recorded when the listing carries none.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// One entry pulled from the listing page, before its body is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArticleStub {
    pub title: String,
    pub link: String,
    pub date_text: String,
    pub category_text: Option<String>,
}

/// An article that passed the dedup gate and is waiting for the bulk insert.
#[derive(Debug, Clone)]
pub struct PendingArticle {
    pub stub: RawArticleStub,
    pub content: String,
}

impl PendingArticle {
    pub fn into_record(self, source: &str, ingested_at: DateTime<Utc>) -> ArticleRecord {
        let RawArticleStub {
            title,
            link,
            date_text,
            category_text,
        } = self.stub;

        ArticleRecord {
            source: source.to_string(),
            title,
            link,
            published_date: date_text,
            category: category_text.unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
            content: self.content,
            ingested_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    pub source: String,
    pub title: String,
    pub link: String,
    /// Free-form date text as printed by the source.
    pub published_date: String,
    pub category: String,
    pub content: String,
    pub ingested_at: DateTime<Utc>,
}
