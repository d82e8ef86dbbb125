pub const SCHEMA: &str = r#"
-- articles table
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    title TEXT NOT NULL,
    link TEXT NOT NULL CHECK (link <> ''),
    published_date TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'Unknown',
    content TEXT NOT NULL DEFAULT '',
    ingested_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_articles_ingested_at ON articles(ingested_at DESC);
CREATE INDEX IF NOT EXISTS idx_articles_category ON articles(category);
"#;

/// Applied after `SCHEMA`. Fails on a database that already holds duplicate
/// links; the store keeps working without it.
pub const UNIQUE_LINK_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_link ON articles(link);";
