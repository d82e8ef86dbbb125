mod aggregator;
mod ingestor;

pub use aggregator::Aggregator;
pub use ingestor::{IngestionResult, Ingestor};
