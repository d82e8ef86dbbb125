use chrono::NaiveDate;

/// Result of an aggregation over the corpus.
///
/// `NoData` means the corpus was empty, which is different from a view
/// whose counts are all zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateView<T> {
    NoData,
    Data(T),
}

#[cfg(test)]
impl<T> AggregateView<T> {
    pub fn is_no_data(&self) -> bool {
        matches!(self, AggregateView::NoData)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            AggregateView::NoData => None,
            AggregateView::Data(data) => Some(data),
        }
    }
}

/// Mention count per tracked term, highest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermFrequency {
    pub entries: Vec<(String, u64)>,
}

#[cfg(test)]
impl TermFrequency {
    pub fn get(&self, term: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(t, _)| t == term)
            .map(|(_, count)| *count)
    }
}

/// Article count per category, highest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDistribution {
    pub entries: Vec<(String, u64)>,
}

#[cfg(test)]
impl CategoryDistribution {
    pub fn get(&self, category: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, count)| *count)
    }
}

/// Articles ingested per calendar day, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionTrend {
    pub entries: Vec<(NaiveDate, u64)>,
}
