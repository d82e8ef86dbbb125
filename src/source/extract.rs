//! Markup extraction for the listing and article pages of the source.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::SourceConfig;
use crate::error::{AppError, Result};
use crate::models::RawArticleStub;

/// Compiled selectors for one source.
#[derive(Debug, Clone)]
pub struct ListingRules {
    base_url: Url,
    article: Selector,
    title: Selector,
    link: Selector,
    date: Selector,
    category: Selector,
    paragraph: Selector,
}

fn compile(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| AppError::Config(format!("invalid selector {:?}: {:?}", css, e)))
}

impl ListingRules {
    pub fn compile(source: &SourceConfig) -> Result<Self> {
        let base_url = Url::parse(&source.listing_url).map_err(|e| {
            AppError::Config(format!("invalid listing_url {:?}: {}", source.listing_url, e))
        })?;
        let s = &source.selectors;

        Ok(Self {
            base_url,
            article: compile(&s.article)?,
            title: compile(&s.title)?,
            link: compile(&s.link)?,
            date: compile(&s.date)?,
            category: compile(&s.category)?,
            paragraph: compile(&s.paragraph)?,
        })
    }

    /// Pulls every complete stub out of a listing page, in page order.
    ///
    /// A block missing its title, link or date is dropped. A missing category
    /// is kept as `None`.
    pub fn extract_listing(&self, raw: &[u8]) -> Vec<RawArticleStub> {
        let html = String::from_utf8_lossy(raw);
        let document = Html::parse_document(&html);

        let mut stubs = Vec::new();
        for block in document.select(&self.article) {
            match self.stub_from_block(block) {
                Some(stub) => stubs.push(stub),
                None => tracing::debug!("Skipping listing block with missing fields"),
            }
        }
        stubs
    }

    fn stub_from_block(&self, block: ElementRef<'_>) -> Option<RawArticleStub> {
        let title = block.select(&self.title).next().map(element_text)?;
        let href = block.select(&self.link).next()?.value().attr("href")?.trim();
        let date_text = block.select(&self.date).next().map(element_text)?;
        let category_text = block
            .select(&self.category)
            .next()
            .map(element_text)
            .filter(|c| !c.is_empty());

        if href.is_empty() {
            return None;
        }
        let link = self.base_url.join(href).ok()?.to_string();

        Some(RawArticleStub {
            title,
            link,
            date_text,
            category_text,
        })
    }

    /// Text of every paragraph on an article page, space-joined as-is.
    /// Never fails; a page without paragraphs yields an empty string.
    pub fn extract_body(&self, raw: &[u8]) -> String {
        let html = String::from_utf8_lossy(raw);
        let document = Html::parse_document(&html);

        document
            .select(&self.paragraph)
            .map(|p| p.text().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
