//! In-memory listing store for tests and offline runs.

use async_trait::async_trait;
use hashbrown::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::store::{CountQuery, ListingPage, ListingStore, ListingTable};
use crate::error::{DashboardError, Result};
use crate::models::ListingRecord;

/// Serves a fixed set of listings and records how many pages were requested.
///
/// Date filters on counts are ignored.
#[derive(Debug, Default)]
pub struct InMemoryListingStore {
    rows: Vec<ListingRecord>,
    reported_total: Option<u64>,
    raw_counts: HashMap<String, u64>,
    enabled: Vec<String>,
    fail_at_offset: Option<usize>,
    page_requests: AtomicUsize,
}

impl InMemoryListingStore {
    /// Rows are served in id order, like the real store.
    pub fn new(mut rows: Vec<ListingRecord>) -> Self {
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        let mut enabled: Vec<String> = rows.iter().map(|r| r.source.clone()).collect();
        enabled.sort();
        enabled.dedup();

        Self {
            rows,
            enabled,
            ..Default::default()
        }
    }

    /// Report `total` with every page, whether or not it matches the rows
    pub fn with_reported_total(mut self, total: u64) -> Self {
        self.reported_total = Some(total);
        self
    }

    pub fn with_raw_count(mut self, source: &str, count: u64) -> Self {
        self.raw_counts.insert(source.to_string(), count);
        self
    }

    pub fn with_enabled_sources(mut self, sources: &[&str]) -> Self {
        self.enabled = sources.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Fail the page request starting at `offset`
    pub fn failing_at(mut self, offset: usize) -> Self {
        self.fail_at_offset = Some(offset);
        self
    }

    pub fn page_requests(&self) -> usize {
        self.page_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingStore for InMemoryListingStore {
    async fn active_page(&self, offset: usize, limit: usize) -> Result<ListingPage> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_at_offset == Some(offset) {
            return Err(DashboardError::upstream("listing store", "status 503"));
        }

        Ok(ListingPage {
            rows: self.rows.iter().skip(offset).take(limit).cloned().collect(),
            total: self.reported_total,
        })
    }

    async fn enabled_sources(&self) -> Result<Vec<String>> {
        Ok(self.enabled.clone())
    }

    async fn count(&self, query: &CountQuery) -> Result<u64> {
        Ok(match query.table {
            ListingTable::Raw => self.raw_counts.get(&query.source).copied().unwrap_or(0),
            ListingTable::Normalized => self
                .rows
                .iter()
                .filter(|r| r.source == query.source)
                .count() as u64,
        })
    }
}
