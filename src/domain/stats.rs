//! Run statistics reported to callers

use serde::{Deserialize, Serialize};

/// What the reconciler did with one product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// First sighting: article, price and latest price written
    Created,
    /// Known article, new price for the day
    Appended,
    /// Price for the day already recorded
    Skipped,
}

/// Summary of a crawl or recovery run.
///
/// Always returned, even when everything failed (all zero).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub categories_processed: u32,
    pub categories_aborted: u32,
    pub pages_fetched: u32,
    pub products_extracted: u32,
    pub products_rejected: u32,
    pub duplicates_removed: u32,
    pub articles_created: u32,
    pub prices_appended: u32,
    pub articles_refreshed: u32,
    /// Products left untouched, including the ones whose reconciliation failed
    pub skipped: u32,
    pub reconciliation_errors: u32,
}

impl CrawlStats {
    pub fn record_outcome(&mut self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Created => self.articles_created += 1,
            ReconcileOutcome::Appended => self.prices_appended += 1,
            ReconcileOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn record_reconciliation_error(&mut self) {
        self.reconciliation_errors += 1;
        self.skipped += 1;
    }

    /// Rows written to the catalog or the history
    pub fn rows_written(&self) -> u32 {
        self.articles_created + self.prices_appended
    }

    pub fn merge(&mut self, other: &Self) {
        self.categories_processed += other.categories_processed;
        self.categories_aborted += other.categories_aborted;
        self.pages_fetched += other.pages_fetched;
        self.products_extracted += other.products_extracted;
        self.products_rejected += other.products_rejected;
        self.duplicates_removed += other.duplicates_removed;
        self.articles_created += other.articles_created;
        self.prices_appended += other.prices_appended;
        self.articles_refreshed += other.articles_refreshed;
        self.skipped += other.skipped;
        self.reconciliation_errors += other.reconciliation_errors;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_reconciliation_counts_as_skipped() {
        let mut stats = CrawlStats::default();
        stats.record_outcome(ReconcileOutcome::Created);
        stats.record_outcome(ReconcileOutcome::Appended);
        stats.record_outcome(ReconcileOutcome::Skipped);
        stats.record_reconciliation_error();

        assert_eq!(stats.articles_created, 1);
        assert_eq!(stats.prices_appended, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.reconciliation_errors, 1);
        assert_eq!(stats.rows_written(), 2);
    }

    #[test]
    fn test_merge_adds_counters() {
        let mut total = CrawlStats { pages_fetched: 3, ..Default::default() };
        let other = CrawlStats { pages_fetched: 2, categories_aborted: 1, ..Default::default() };
        total.merge(&other);
        assert_eq!(total.pages_fetched, 5);
        assert_eq!(total.categories_aborted, 1);
    }
}
