//! Read-only contract of the external listing store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::ListingRecord;

/// One range of active listings, ordered by id
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub rows: Vec<ListingRecord>,
    /// Row count reported alongside the page, if the store provides one.
    /// May be stale, so it never ends a scan.
    pub total: Option<u64>,
}

/// Which listing table a count targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingTable {
    /// Raw collector payloads
    Raw,
    /// Deduplicated, normalized listings
    Normalized,
}

impl ListingTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            ListingTable::Raw => "listings_raw",
            ListingTable::Normalized => "listings_normalized",
        }
    }

    /// Timestamp column used for `since` filters
    pub fn seen_column(&self) -> &'static str {
        match self {
            ListingTable::Raw => "fetched_at",
            ListingTable::Normalized => "last_seen_at",
        }
    }
}

/// Count-only query filtered by source and optionally by date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountQuery {
    pub table: ListingTable,
    pub source: String,
    pub since: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Active listings in `[offset, offset + limit)` by stable id order
    async fn active_page(&self, offset: usize, limit: usize) -> Result<ListingPage>;

    /// Names of the ingestion sources currently enabled
    async fn enabled_sources(&self) -> Result<Vec<String>>;

    async fn count(&self, query: &CountQuery) -> Result<u64>;
}
