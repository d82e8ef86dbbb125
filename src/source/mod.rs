mod extract;
mod fetcher;

pub use extract::ListingRules;
pub use fetcher::{HttpFetcher, PageFetcher};
