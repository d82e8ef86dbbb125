mod aggregate;
mod article;

pub use aggregate::{AggregateView, CategoryDistribution, IngestionTrend, TermFrequency};
pub use article::{ArticleRecord, PendingArticle, RawArticleStub};
#[cfg(test)]
pub use article::UNKNOWN_CATEGORY;
