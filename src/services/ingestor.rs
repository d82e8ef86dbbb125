use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::config::SourceConfig;
use crate::db::{CorpusStore, FailedInsert, InsertFailure, InsertReport};
use crate::error::{AppError, Result};
use crate::models::{PendingArticle, RawArticleStub};
use crate::source::{ListingRules, PageFetcher};

/// Outcome of one ingestion cycle.
#[derive(Debug, Default)]
pub struct IngestionResult {
    pub inserted_count: usize,
    /// Links already stored, repeated within the listing, or rejected by the
    /// store's uniqueness constraint.
    pub skipped_count: usize,
    /// Articles stored with empty content because their page could not be fetched.
    pub degraded_count: usize,
    /// Inserts rejected for reasons other than a duplicate link.
    pub failed: Vec<FailedInsert>,
    pub error: Option<AppError>,
}

impl IngestionResult {
    fn aborted(error: AppError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Folds a bulk insert report in: store-side duplicates count as skipped,
    /// every other rejection is kept in `failed`.
    fn absorb(&mut self, report: InsertReport) {
        self.inserted_count = report.inserted.len();
        self.skipped_count += report.duplicate_count();
        for failure in report.failed {
            if failure.reason == InsertFailure::DuplicateKey {
                tracing::debug!(link = %failure.link, "Store rejected duplicate link");
            } else {
                tracing::warn!(link = %failure.link, reason = %failure.reason, "Insert failed");
                self.failed.push(failure);
            }
        }
    }
}

/// Fetches the listing, filters out known links, fetches the remaining
/// bodies and bulk-inserts them.
pub struct Ingestor<F, S> {
    fetcher: F,
    store: Arc<S>,
    rules: ListingRules,
    source_name: String,
    listing_url: String,
    body_concurrency: usize,
}

impl<F, S> Ingestor<F, S>
where
    F: PageFetcher,
    S: CorpusStore,
{
    pub fn new(fetcher: F, store: Arc<S>, source: &SourceConfig) -> Result<Self> {
        Ok(Self {
            fetcher,
            store,
            rules: ListingRules::compile(source)?,
            source_name: source.name.clone(),
            listing_url: source.listing_url.clone(),
            body_concurrency: source.body_concurrency.max(1),
        })
    }

    pub async fn run_cycle(&self) -> IngestionResult {
        let raw = match self.fetcher.fetch_page(&self.listing_url).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(url = %self.listing_url, error = %e, "Listing fetch failed");
                return IngestionResult::aborted(e.into());
            }
        };

        let stubs = self.rules.extract_listing(&raw);
        tracing::info!(count = stubs.len(), url = %self.listing_url, "Extracted listing");

        let mut result = IngestionResult::default();
        let mut seen = HashSet::new();
        let mut fresh: Vec<RawArticleStub> = Vec::new();

        for stub in stubs {
            if !seen.insert(stub.link.clone()) {
                tracing::debug!(link = %stub.link, "Skipping repeated listing entry");
                result.skipped_count += 1;
                continue;
            }
            match self.store.exists(&stub.link).await {
                Ok(true) => {
                    tracing::debug!(link = %stub.link, "Skipping duplicate");
                    result.skipped_count += 1;
                }
                Ok(false) => fresh.push(stub),
                Err(e) => {
                    tracing::error!(error = %e, "Existence check failed; aborting cycle");
                    result.error = Some(e);
                    return result;
                }
            }
        }

        let pending = self.fetch_bodies(fresh).await;
        result.degraded_count = pending.iter().filter(|(_, ok)| !ok).count();

        let ingested_at = Utc::now();
        let records = pending
            .into_iter()
            .map(|(article, _)| article.into_record(&self.source_name, ingested_at))
            .collect();

        match self.store.insert_many(records).await {
            Ok(report) => result.absorb(report),
            Err(e) => {
                tracing::error!(error = %e, "Bulk insert failed");
                result.error = Some(e);
            }
        }

        tracing::info!(
            inserted = result.inserted_count,
            skipped = result.skipped_count,
            degraded = result.degraded_count,
            failed = result.failed.len(),
            "Ingestion cycle finished"
        );
        result
    }

    /// Fetches bodies with bounded concurrency, keeping listing order. The
    /// flag is false when the page could not be fetched.
    async fn fetch_bodies(&self, stubs: Vec<RawArticleStub>) -> Vec<(PendingArticle, bool)> {
        stream::iter(stubs)
            .map(|stub| async move {
                match self.fetcher.fetch_page(&stub.link).await {
                    Ok(raw) => {
                        let content = self.rules.extract_body(&raw);
                        (PendingArticle { stub, content }, true)
                    }
                    Err(e) => {
                        tracing::warn!(
                            link = %stub.link,
                            error = %e,
                            "Article fetch failed; storing without content"
                        );
                        let content = String::new();
                        (PendingArticle { stub, content }, false)
                    }
                }
            })
            .buffered(self.body_concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Repository;
    use crate::models::{ArticleRecord, UNKNOWN_CATEGORY};
    use crate::test_support::{
        article_page, listing_block, listing_page, Reply, StubFetcher, LISTING_URL,
    };
    use async_trait::async_trait;

    fn listing() -> String {
        listing_page(&[
            listing_block("Tari Gambyong", "https://news.detik.com/1", "Senin", Some("Budaya")),
            listing_block("Reog Ponorogo", "https://news.detik.com/2", "Selasa", None),
            listing_block("Kuda Lumping", "https://news.detik.com/3", "Rabu", Some("Seni")),
        ])
    }

    fn fetcher() -> StubFetcher {
        StubFetcher::new()
            .reply(LISTING_URL, Reply::Body(listing()))
            .reply(
                "https://news.detik.com/1",
                Reply::Body(article_page(&["Gambyong dance", "and Gambyong style"])),
            )
            .reply(
                "https://news.detik.com/2",
                Reply::Body(article_page(&["Reog from Ponorogo"])),
            )
            .reply(
                "https://news.detik.com/3",
                Reply::Body(article_page(&["Kuda lumping show"])),
            )
    }

    fn source() -> SourceConfig {
        SourceConfig {
            listing_url: LISTING_URL.to_string(),
            ..SourceConfig::default()
        }
    }

    async fn setup(fetcher: StubFetcher) -> (Ingestor<StubFetcher, Repository>, Arc<Repository>) {
        let repo = Arc::new(Repository::open_in_memory().await.unwrap());
        let ingestor = Ingestor::new(fetcher, Arc::clone(&repo), &source()).unwrap();
        (ingestor, repo)
    }

    #[tokio::test]
    async fn ingests_listing_with_bodies() {
        let (ingestor, repo) = setup(fetcher()).await;

        let result = ingestor.run_cycle().await;
        assert!(result.error.is_none());
        assert_eq!(result.inserted_count, 3);
        assert_eq!(result.skipped_count, 0);
        assert_eq!(result.degraded_count, 0);

        let all = repo.scan_all().await.unwrap();
        let links: Vec<_> = all.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://news.detik.com/1",
                "https://news.detik.com/2",
                "https://news.detik.com/3"
            ]
        );
        assert_eq!(all[0].content, "Gambyong dance and Gambyong style");
        assert_eq!(all[0].source, "Detik");
        assert_eq!(all[0].published_date, "Senin");
        assert_eq!(all[1].category, UNKNOWN_CATEGORY);
        let dist = crate::services::aggregator::category_distribution(&all);
        assert_eq!(dist.data().unwrap().get(UNKNOWN_CATEGORY), Some(1));
        assert!(all.iter().all(|r| r.ingested_at == all[0].ingested_at));
    }

    #[tokio::test]
    async fn second_cycle_inserts_nothing() {
        let (ingestor, repo) = setup(fetcher()).await;

        let first = ingestor.run_cycle().await;
        assert_eq!(first.inserted_count, 3);
        let before = repo.scan_all().await.unwrap();

        let second = ingestor.run_cycle().await;
        assert!(second.error.is_none());
        assert_eq!(second.inserted_count, 0);
        assert_eq!(second.skipped_count, 3);
        assert_eq!(repo.scan_all().await.unwrap(), before);

        // Bodies are only fetched for links that were new.
        assert_eq!(ingestor.fetcher.request_count("https://news.detik.com/1"), 1);
        assert_eq!(ingestor.fetcher.request_count(LISTING_URL), 2);
    }

    #[tokio::test]
    async fn new_listing_entries_are_picked_up_later() {
        let (ingestor, repo) = setup(fetcher()).await;
        ingestor.run_cycle().await;

        let mut blocks = vec![listing_block("Jatilan", "https://news.detik.com/4", "Kamis", None)];
        blocks.push(listing_block("Tari Gambyong", "https://news.detik.com/1", "Senin", None));
        ingestor.fetcher.set(LISTING_URL, Reply::Body(listing_page(&blocks)));
        ingestor.fetcher.set(
            "https://news.detik.com/4",
            Reply::Body(article_page(&["Jatilan"])),
        );

        let result = ingestor.run_cycle().await;
        assert_eq!(result.inserted_count, 1);
        assert_eq!(result.skipped_count, 1);
        assert_eq!(repo.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn failed_body_degrades_only_that_record() {
        let fetcher = fetcher();
        fetcher.set("https://news.detik.com/2", Reply::Status(500));
        let (ingestor, repo) = setup(fetcher).await;

        let result = ingestor.run_cycle().await;
        assert!(result.error.is_none());
        assert_eq!(result.inserted_count, 3);
        assert_eq!(result.degraded_count, 1);

        let all = repo.scan_all().await.unwrap();
        assert_eq!(all[0].content, "Gambyong dance and Gambyong style");
        assert_eq!(all[1].content, "");
        assert_eq!(all[2].content, "Kuda lumping show");
    }

    #[tokio::test]
    async fn body_timeout_is_not_fatal() {
        let fetcher = fetcher();
        fetcher.set("https://news.detik.com/1", Reply::Timeout);
        let (ingestor, repo) = setup(fetcher).await;

        let result = ingestor.run_cycle().await;
        assert!(result.error.is_none());
        assert_eq!(result.inserted_count, 3);
        assert_eq!(result.degraded_count, 1);
        assert!(repo.exists("https://news.detik.com/1").await.unwrap());
    }

    #[tokio::test]
    async fn listing_failure_aborts_the_cycle() {
        let fetcher = fetcher();
        fetcher.set(LISTING_URL, Reply::Status(503));
        let (ingestor, repo) = setup(fetcher).await;

        let result = ingestor.run_cycle().await;
        assert!(matches!(
            result.error,
            Some(AppError::ListingFetch(crate::error::FetchError::Status { status: 503, .. }))
        ));
        assert_eq!(result.inserted_count, 0);
        assert_eq!(result.skipped_count, 0);
        assert_eq!(repo.count().await.unwrap(), 0);
        assert_eq!(ingestor.fetcher.requests(), vec![LISTING_URL.to_string()]);
    }

    #[tokio::test]
    async fn repeated_link_in_listing_is_fetched_once() {
        let fetcher = fetcher();
        fetcher.set(
            LISTING_URL,
            Reply::Body(listing_page(&[
                listing_block("Tayub", "https://news.detik.com/1", "Senin", None),
                listing_block("Tayub again", "https://news.detik.com/1", "Senin", None),
            ])),
        );
        let (ingestor, repo) = setup(fetcher).await;

        let result = ingestor.run_cycle().await;
        assert_eq!(result.inserted_count, 1);
        assert_eq!(result.skipped_count, 1);
        assert_eq!(ingestor.fetcher.request_count("https://news.detik.com/1"), 1);
        assert_eq!(repo.scan_all().await.unwrap()[0].title, "Tayub");
    }

    #[tokio::test]
    async fn empty_listing_is_a_successful_noop() {
        let fetcher = fetcher();
        fetcher.set(LISTING_URL, Reply::Body("<html></html>".into()));
        let (ingestor, repo) = setup(fetcher).await;

        let result = ingestor.run_cycle().await;
        assert!(result.error.is_none());
        assert_eq!(result.inserted_count, 0);
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn single_worker_keeps_listing_order() {
        let repo = Arc::new(Repository::open_in_memory().await.unwrap());
        let source = SourceConfig {
            body_concurrency: 1,
            ..source()
        };
        let ingestor = Ingestor::new(fetcher(), Arc::clone(&repo), &source).unwrap();

        ingestor.run_cycle().await;
        let recent = repo.find_recent(10).await.unwrap();
        let links: Vec<_> = recent.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://news.detik.com/3",
                "https://news.detik.com/2",
                "https://news.detik.com/1"
            ]
        );
    }

    /// Store whose existence check always misses, as if another cycle inserted
    /// the same links between our check and our insert.
    struct RacingStore(Repository);

    #[async_trait]
    impl CorpusStore for RacingStore {
        async fn exists(&self, _link: &str) -> Result<bool> {
            Ok(false)
        }

        async fn insert_many(&self, records: Vec<ArticleRecord>) -> Result<InsertReport> {
            self.0.insert_many(records).await
        }

        async fn find_recent(&self, limit: usize) -> Result<Vec<ArticleRecord>> {
            self.0.find_recent(limit).await
        }

        async fn scan_all(&self) -> Result<Vec<ArticleRecord>> {
            self.0.scan_all().await
        }
    }

    #[tokio::test]
    async fn uniqueness_constraint_catches_missed_duplicates() {
        let store = Arc::new(RacingStore(Repository::open_in_memory().await.unwrap()));
        let ingestor = Ingestor::new(fetcher(), Arc::clone(&store), &source()).unwrap();

        assert_eq!(ingestor.run_cycle().await.inserted_count, 3);

        let second = ingestor.run_cycle().await;
        assert!(second.error.is_none());
        assert_eq!(second.inserted_count, 0);
        assert_eq!(second.skipped_count, 3);
        assert!(second.failed.is_empty());

        let all = store.scan_all().await.unwrap();
        let unique: HashSet<_> = all.iter().map(|r| r.link.clone()).collect();
        assert_eq!(all.len(), 3);
        assert_eq!(unique.len(), 3);
    }

    enum Fault {
        Lookup,
        BulkInsert,
        RejectEveryOther,
    }

    /// Store that fails in a scripted way and records how many records it
    /// was asked to insert.
    struct FaultyStore {
        fault: Fault,
        offered: std::sync::Mutex<usize>,
    }

    impl FaultyStore {
        fn new(fault: Fault) -> Self {
            Self {
                fault,
                offered: std::sync::Mutex::new(0),
            }
        }

        fn offered(&self) -> usize {
            *self.offered.lock().unwrap()
        }
    }

    #[async_trait]
    impl CorpusStore for FaultyStore {
        async fn exists(&self, _link: &str) -> Result<bool> {
            match self.fault {
                Fault::Lookup => Err(AppError::StoreConnection("database is locked".into())),
                _ => Ok(false),
            }
        }

        async fn insert_many(&self, records: Vec<ArticleRecord>) -> Result<InsertReport> {
            *self.offered.lock().unwrap() += records.len();
            match self.fault {
                Fault::BulkInsert => Err(AppError::StoreConnection("disk gone".into())),
                _ => {
                    let mut report = InsertReport::default();
                    for (i, record) in records.into_iter().enumerate() {
                        if i % 2 == 1 {
                            report.failed.push(FailedInsert {
                                link: record.link,
                                reason: InsertFailure::Rejected("CHECK constraint failed".into()),
                            });
                        } else {
                            report.inserted.push(record.link);
                        }
                    }
                    Ok(report)
                }
            }
        }

        async fn find_recent(&self, _limit: usize) -> Result<Vec<ArticleRecord>> {
            Ok(Vec::new())
        }

        async fn scan_all(&self) -> Result<Vec<ArticleRecord>> {
            Ok(Vec::new())
        }
    }

    fn faulty(fault: Fault) -> (Ingestor<StubFetcher, FaultyStore>, Arc<FaultyStore>) {
        let store = Arc::new(FaultyStore::new(fault));
        let ingestor = Ingestor::new(fetcher(), Arc::clone(&store), &source()).unwrap();
        (ingestor, store)
    }

    #[tokio::test]
    async fn bulk_insert_error_is_reported_not_raised() {
        let (ingestor, store) = faulty(Fault::BulkInsert);

        let result = ingestor.run_cycle().await;
        assert!(matches!(result.error, Some(AppError::StoreConnection(ref m)) if m == "disk gone"));
        assert_eq!(result.inserted_count, 0);
        assert_eq!(result.skipped_count, 0);
        assert!(result.failed.is_empty());
        assert_eq!(store.offered(), 3);
    }

    #[tokio::test]
    async fn rejected_records_are_listed_as_failed() {
        let (ingestor, store) = faulty(Fault::RejectEveryOther);

        let result = ingestor.run_cycle().await;
        assert!(result.error.is_none());
        assert_eq!(store.offered(), 3);
        assert_eq!(result.inserted_count, 2);
        assert_eq!(result.skipped_count, 0);
        assert_eq!(
            result.failed,
            vec![FailedInsert {
                link: "https://news.detik.com/2".into(),
                reason: InsertFailure::Rejected("CHECK constraint failed".into()),
            }]
        );
    }

    #[tokio::test]
    async fn lookup_error_aborts_before_fetching_bodies() {
        let (ingestor, store) = faulty(Fault::Lookup);

        let result = ingestor.run_cycle().await;
        assert!(matches!(result.error, Some(AppError::StoreConnection(_))));
        assert_eq!(result.inserted_count, 0);
        assert_eq!(result.skipped_count, 0);
        assert_eq!(result.degraded_count, 0);
        assert_eq!(store.offered(), 0);
        assert_eq!(ingestor.fetcher.requests(), vec![LISTING_URL.to_string()]);
    }
}
