use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

const APP_DIR: &str = "tari-watch";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Number of articles shown in the "recent articles" section.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    #[serde(default = "default_tracked_terms")]
    pub tracked_terms: Vec<String>,

    #[serde(default)]
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Provenance tag written into every stored article.
    #[serde(default = "default_source_name")]
    pub name: String,

    #[serde(default = "default_listing_url")]
    pub listing_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout, shared by the listing and every article body.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Max article bodies fetched concurrently.
    #[serde(default = "default_body_concurrency")]
    pub body_concurrency: usize,

    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// CSS selectors describing the source's markup.
///
/// All selectors except `article` and `paragraph` are evaluated inside each
/// matched `article` element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub article: String,
    pub title: String,
    pub link: String,
    pub date: String,
    pub category: String,
    pub paragraph: String,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("corpus.db").to_string_lossy().to_string()
}

fn default_recent_limit() -> usize {
    10
}

fn default_tracked_terms() -> Vec<String> {
    [
        "gambyong",
        "bedhaya",
        "serimpi",
        "kuda lumping",
        "tayub",
        "lengger",
        "tari topeng",
        "bambangan cakil",
        "reog",
        "jatilan",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_source_name() -> String {
    "Detik".to_string()
}

fn default_listing_url() -> String {
    "https://www.detik.com/tag/tarian".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_body_concurrency() -> usize {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            recent_limit: default_recent_limit(),
            tracked_terms: default_tracked_terms(),
            source: SourceConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: default_source_name(),
            listing_url: default_listing_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            body_concurrency: default_body_concurrency(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            article: "article".to_string(),
            title: "h2.title".to_string(),
            link: "a".to_string(),
            date: "span.date".to_string(),
            category: "span.category".to_string(),
            paragraph: "p".to_string(),
        }
    }
}

impl Config {
    /// Loads the config file, writing the defaults out on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save_to(path)?;
            config
        };
        config.validate()
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Normalises tracked terms and rejects settings the pipeline cannot run with.
    pub fn validate(mut self) -> Result<Self> {
        let mut terms: Vec<String> = Vec::with_capacity(self.tracked_terms.len());
        for term in &self.tracked_terms {
            let term = term.trim().to_lowercase();
            if !term.is_empty() && !terms.contains(&term) {
                terms.push(term);
            }
        }
        if terms.is_empty() {
            return Err(AppError::Config("tracked_terms must not be empty".into()));
        }
        self.tracked_terms = terms;

        if self.source.timeout_secs == 0 {
            return Err(AppError::Config("source.timeout_secs must be positive".into()));
        }
        if self.source.body_concurrency == 0 {
            return Err(AppError::Config(
                "source.body_concurrency must be positive".into(),
            ));
        }
        url::Url::parse(&self.source.listing_url).map_err(|e| {
            AppError::Config(format!(
                "invalid listing_url {:?}: {}",
                self.source.listing_url, e
            ))
        })?;

        Ok(self)
    }
}
