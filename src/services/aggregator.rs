use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Local, TimeZone};

use crate::db::CorpusStore;
use crate::error::Result;
use crate::models::{
    AggregateView, ArticleRecord, CategoryDistribution, IngestionTrend, TermFrequency,
};

/// Read-only views over the whole corpus, recomputed on every call.
pub struct Aggregator<S> {
    store: Arc<S>,
    terms: Vec<String>,
}

impl<S: CorpusStore> Aggregator<S> {
    pub fn new(store: Arc<S>, terms: Vec<String>) -> Self {
        let terms = terms
            .into_iter()
            .map(|t| t.to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { store, terms }
    }

    pub fn tracked_terms(&self) -> &[String] {
        &self.terms
    }

    pub async fn term_frequency(&self) -> Result<AggregateView<TermFrequency>> {
        let records = self.store.scan_all().await?;
        Ok(term_frequency(&records, &self.terms))
    }

    pub async fn category_distribution(&self) -> Result<AggregateView<CategoryDistribution>> {
        let records = self.store.scan_all().await?;
        Ok(category_distribution(&records))
    }

    pub async fn ingestion_trend(&self) -> Result<AggregateView<IngestionTrend>> {
        let records = self.store.scan_all().await?;
        Ok(ingestion_trend(&records))
    }
}

/// Counts literal, non-overlapping, case-insensitive occurrences of each term.
///
/// There is no word-boundary check: "reog" also counts inside "reogan".
/// Whitespace is not normalised, so "kuda lumping" misses "kuda   lumping".
pub fn term_frequency(records: &[ArticleRecord], terms: &[String]) -> AggregateView<TermFrequency> {
    if records.is_empty() {
        return AggregateView::NoData;
    }

    let mut entries: Vec<(String, u64)> = terms.iter().map(|t| (t.clone(), 0)).collect();
    for record in records.iter().filter(|r| !r.content.is_empty()) {
        let content = record.content.to_lowercase();
        for (term, count) in entries.iter_mut() {
            *count += content.matches(term.as_str()).count() as u64;
        }
    }

    // Stable: equal counts keep the configured order.
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    AggregateView::Data(TermFrequency { entries })
}

pub fn category_distribution(records: &[ArticleRecord]) -> AggregateView<CategoryDistribution> {
    if records.is_empty() {
        return AggregateView::NoData;
    }

    let mut counts: HashMap<&str, u64> = HashMap::new();
    for record in records {
        *counts.entry(record.category.as_str()).or_default() += 1;
    }

    let mut entries: Vec<(String, u64)> = counts
        .into_iter()
        .map(|(category, count)| (category.to_string(), count))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    AggregateView::Data(CategoryDistribution { entries })
}

/// Groups by the local calendar date of `ingested_at`, oldest first.
pub fn ingestion_trend(records: &[ArticleRecord]) -> AggregateView<IngestionTrend> {
    ingestion_trend_in(records, &Local)
}

/// Groups by the calendar date of `ingested_at` as seen in `tz`.
pub fn ingestion_trend_in<Tz: TimeZone>(
    records: &[ArticleRecord],
    tz: &Tz,
) -> AggregateView<IngestionTrend> {
    if records.is_empty() {
        return AggregateView::NoData;
    }

    let mut days = BTreeMap::new();
    for record in records {
        let day = record.ingested_at.with_timezone(tz).date_naive();
        *days.entry(day).or_insert(0u64) += 1;
    }
    AggregateView::Data(IngestionTrend {
        entries: days.into_iter().collect(),
    })
}
