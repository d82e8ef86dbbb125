//! Plain-text rendering of the ingestion outcome and corpus views.

use std::io::{self, Write};

use crate::models::{
    AggregateView, ArticleRecord, CategoryDistribution, IngestionTrend, TermFrequency,
};
use crate::services::IngestionResult;

const BAR_WIDTH: u64 = 40;
const NO_DATA: &str = "No data to visualise yet.";

pub fn render_ingestion(out: &mut impl Write, result: &IngestionResult) -> io::Result<()> {
    if let Some(error) = &result.error {
        writeln!(out, "Scraping error: {}", error)?;
    } else if result.inserted_count > 0 {
        writeln!(out, "{} articles saved.", result.inserted_count)?;
    } else {
        writeln!(out, "No new articles to save.")?;
    }

    if result.skipped_count > 0 {
        writeln!(out, "{} already stored, skipped.", result.skipped_count)?;
    }
    if result.degraded_count > 0 {
        writeln!(
            out,
            "{} saved without content (article page unavailable).",
            result.degraded_count
        )?;
    }
    for failure in &result.failed {
        writeln!(out, "Not saved: {} ({})", failure.link, failure.reason)?;
    }
    Ok(())
}

pub fn render_recent(out: &mut impl Write, records: &[ArticleRecord]) -> io::Result<()> {
    heading(out, "Recent articles")?;
    if records.is_empty() {
        return writeln!(out, "{}", NO_DATA);
    }
    for record in records {
        writeln!(out, "{}", record.title)?;
        writeln!(
            out,
            "  Date: {} | Category: {}",
            record.published_date, record.category
        )?;
        writeln!(out, "  {}", record.link)?;
        writeln!(out, "  ---")?;
    }
    Ok(())
}

pub fn render_tracked_terms(out: &mut impl Write, terms: &[String], source: &str) -> io::Result<()> {
    heading(out, "Tracked dances")?;
    let width = terms.iter().map(|t| t.chars().count()).max().unwrap_or(0);
    for term in terms {
        writeln!(out, "{:<width$}  {}", term, source, width = width)?;
    }
    Ok(())
}

pub fn render_term_frequency(
    out: &mut impl Write,
    view: &AggregateView<TermFrequency>,
) -> io::Result<()> {
    heading(out, "Mentions per dance")?;
    match view {
        AggregateView::NoData => writeln!(out, "{}", NO_DATA),
        AggregateView::Data(freq) => render_bars(out, &freq.entries),
    }
}

pub fn render_category_distribution(
    out: &mut impl Write,
    view: &AggregateView<CategoryDistribution>,
) -> io::Result<()> {
    heading(out, "Articles per category")?;
    match view {
        AggregateView::NoData => writeln!(out, "{}", NO_DATA),
        AggregateView::Data(dist) => render_bars(out, &dist.entries),
    }
}

pub fn render_ingestion_trend(
    out: &mut impl Write,
    view: &AggregateView<IngestionTrend>,
) -> io::Result<()> {
    heading(out, "Articles ingested per day")?;
    match view {
        AggregateView::NoData => writeln!(out, "{}", NO_DATA),
        AggregateView::Data(trend) => {
            let rows: Vec<(String, u64)> = trend
                .entries
                .iter()
                .map(|(date, count)| (date.format("%Y-%m-%d").to_string(), *count))
                .collect();
            render_bars(out, &rows)
        }
    }
}

fn heading(out: &mut impl Write, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "== {} ==", title)
}

fn render_bars(out: &mut impl Write, rows: &[(String, u64)]) -> io::Result<()> {
    let label_width = rows.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
    let max = rows.iter().map(|(_, c)| *c).max().unwrap_or(0);

    for (label, count) in rows {
        let len = if max == 0 { 0 } else { count * BAR_WIDTH / max };
        writeln!(
            out,
            "{:<width$}  {:>5}  {}",
            label,
            count,
            "#".repeat(len as usize),
            width = label_width
        )?;
    }
    Ok(())
}
