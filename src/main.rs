use std::io::{self, Write};
use std::sync::Arc;

mod config;
mod db;
mod error;
mod models;
mod report;
mod services;
mod source;
#[cfg(test)]
mod test_support;

use config::Config;
use db::{CorpusStore, Repository};
use error::Result;
use services::{Aggregator, Ingestor};
use source::HttpFetcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = Config::load()?;

    // Open the corpus store
    let repository = Arc::new(Repository::open(&config.db_path).await?);

    let fetcher = HttpFetcher::new(&config.source)?;
    let ingestor = Ingestor::new(fetcher, Arc::clone(&repository), &config.source)?;
    let aggregator = Aggregator::new(Arc::clone(&repository), config.tracked_terms.clone());

    // Run one ingestion cycle
    let outcome = ingestor.run_cycle().await;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    report::render_ingestion(&mut out, &outcome)?;
    if !repository.uniqueness_enforced() {
        writeln!(
            out,
            "Warning: unique index on link is missing; duplicates are only filtered by lookup."
        )?;
    }
    writeln!(out, "Corpus holds {} articles.", repository.count().await?)?;

    let recent = repository.find_recent(config.recent_limit).await?;
    report::render_recent(&mut out, &recent)?;

    report::render_tracked_terms(&mut out, aggregator.tracked_terms(), &config.source.name)?;
    report::render_term_frequency(&mut out, &aggregator.term_frequency().await?)?;
    report::render_category_distribution(&mut out, &aggregator.category_distribution().await?)?;
    report::render_ingestion_trend(&mut out, &aggregator.ingestion_trend().await?)?;

    out.flush()?;
    Ok(())
}
