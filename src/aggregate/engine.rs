//! Paginated aggregation over the active listing set.

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::breakdown::{
    compare_labels, Breakdown, BreakdownRow, Totals, UnknownPlacement, UNKNOWN_BUCKET,
};
use crate::config::AggregationConfig;
use crate::error::{DashboardError, Result};
use crate::listings::{CountQuery, ListingStore, ListingTable};
use crate::models::{AdminLevel, ListingRecord, NormalizedKey, ResolvedHierarchy};
use crate::resolver::{AdminIndexCache, LocationResolver};
use crate::typology::infer_typology;

/// Region breakdowns, one per admin level
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegionBreakdowns {
    pub district: Vec<BreakdownRow>,
    pub municipality: Vec<BreakdownRow>,
    pub parish: Vec<BreakdownRow>,
}

/// Result of one full aggregation pass
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub totals: Totals,
    pub by_source: Vec<BreakdownRow>,
    pub by_region: RegionBreakdowns,
    pub by_typology: Vec<BreakdownRow>,
    pub rows_scanned: u64,
    pub pages_scanned: u64,
    pub generated_at: DateTime<Utc>,
}

/// A listing together with the buckets it was counted in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedListing {
    #[serde(flatten)]
    pub listing: ListingRecord,
    pub region: ResolvedHierarchy,
    pub typology: String,
}

/// Raw and normalized row counts for one ingestion source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceActivity {
    pub source: String,
    pub raw_count: u64,
    pub normalized_count: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct ScanStats {
    rows: u64,
    pages: u64,
}

#[derive(Default)]
struct Accumulator {
    totals: Totals,
    by_source: Breakdown,
    district: Breakdown,
    municipality: Breakdown,
    parish: Breakdown,
    by_typology: Breakdown,
}

impl Accumulator {
    fn add(&mut self, listing: &ClassifiedListing) {
        let listing_type = listing.listing.listing_type;
        let region = &listing.region;

        self.totals.record(listing_type);
        self.by_source.record(&listing.listing.source, listing_type);
        self.district
            .record(bucket_label(region.get(AdminLevel::District)), listing_type);
        self.municipality
            .record(bucket_label(region.get(AdminLevel::Municipality)), listing_type);
        self.parish
            .record(bucket_label(region.get(AdminLevel::Parish)), listing_type);
        self.by_typology.record(&listing.typology, listing_type);
    }
}

fn bucket_label(label: Option<&str>) -> &str {
    label.unwrap_or(UNKNOWN_BUCKET)
}

/// Resolve region and typology for a single row.
pub fn classify(resolver: &LocationResolver, listing: ListingRecord) -> ClassifiedListing {
    let region = resolver.resolve_opt(listing.location_text.as_deref());
    let typology = infer_typology(listing.title.as_deref(), listing.bedrooms);
    ClassifiedListing {
        listing,
        region,
        typology,
    }
}

/// Builds dashboard snapshots and drill-downs from the listing store.
///
/// Every call re-reads the store; nothing is cached between calls apart from
/// the admin index.
pub struct AggregationEngine {
    store: Arc<dyn ListingStore>,
    cache: Arc<AdminIndexCache>,
    config: AggregationConfig,
}

impl AggregationEngine {
    pub fn new(
        store: Arc<dyn ListingStore>,
        cache: Arc<AdminIndexCache>,
        config: AggregationConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Full snapshot of every active listing
    pub async fn aggregate(&self) -> Result<DashboardSnapshot> {
        let resolver = self.cache.resolver().await?;
        let mut acc = Accumulator::default();

        let stats = self
            .scan(self.config.page_size, |listing| {
                acc.add(&classify(&resolver, listing));
            })
            .await?;

        info!(
            "Aggregated {} listings over {} pages ({} sources, {} districts)",
            stats.rows,
            stats.pages,
            acc.by_source.len(),
            acc.district.len()
        );

        Ok(DashboardSnapshot {
            totals: acc.totals,
            by_source: acc.by_source.into_rows(UnknownPlacement::ByCount),
            by_region: RegionBreakdowns {
                district: acc.district.into_rows(UnknownPlacement::ByCount),
                municipality: acc.municipality.into_rows(UnknownPlacement::ByCount),
                parish: acc.parish.into_rows(UnknownPlacement::ByCount),
            },
            by_typology: acc.by_typology.into_rows(UnknownPlacement::Last),
            rows_scanned: stats.rows,
            pages_scanned: stats.pages,
            generated_at: Utc::now(),
        })
    }

    /// Rows counted in the `label` bucket at `level`, including `"Unknown"`.
    pub async fn rows_for_region(
        &self,
        level: AdminLevel,
        label: &str,
    ) -> Result<Vec<ClassifiedListing>> {
        let wanted = NormalizedKey::new(label);
        self.drilldown(|row| NormalizedKey::new(bucket_label(row.region.get(level))) == wanted)
            .await
    }

    pub async fn rows_for_typology(&self, label: &str) -> Result<Vec<ClassifiedListing>> {
        let wanted = NormalizedKey::new(label);
        self.drilldown(|row| NormalizedKey::new(&row.typology) == wanted)
            .await
    }

    /// Source buckets are keyed by the raw source string, so this match is exact.
    pub async fn rows_for_source(&self, name: &str) -> Result<Vec<ClassifiedListing>> {
        self.drilldown(|row| row.listing.source == name).await
    }

    /// Raw and normalized counts per enabled source, sorted by source name.
    ///
    /// Counts for different sources are requested concurrently, at most
    /// `source_fanout` at a time.
    pub async fn source_activity(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SourceActivity>> {
        let sources = self.store.enabled_sources().await?;
        let store = &self.store;

        let mut activity: Vec<SourceActivity> = stream::iter(sources)
            .map(|source| async move {
                let raw = CountQuery {
                    table: ListingTable::Raw,
                    source: source.clone(),
                    since,
                };
                let normalized = CountQuery {
                    table: ListingTable::Normalized,
                    source: source.clone(),
                    since,
                };
                let (raw_count, normalized_count) =
                    futures::try_join!(store.count(&raw), store.count(&normalized))?;

                Ok::<_, DashboardError>(SourceActivity {
                    source,
                    raw_count,
                    normalized_count,
                })
            })
            .buffer_unordered(self.config.source_fanout.max(1))
            .try_collect()
            .await?;

        activity.sort_by(|a, b| compare_labels(&a.source, &b.source));
        Ok(activity)
    }

    async fn drilldown<F>(&self, mut keep: F) -> Result<Vec<ClassifiedListing>>
    where
        F: FnMut(&ClassifiedListing) -> bool,
    {
        let resolver = self.cache.resolver().await?;
        let mut out = Vec::new();

        let stats = self
            .scan(self.config.drilldown_page_size, |listing| {
                let row = classify(&resolver, listing);
                if keep(&row) {
                    out.push(row);
                }
            })
            .await?;

        debug!("Drill-down matched {} of {} listings", out.len(), stats.rows);
        Ok(out)
    }

    /// Walk every active listing page by page.
    ///
    /// Pages are requested one after another. The scan ends on the first
    /// short page; a total reported by the store is only checked afterwards.
    async fn scan<F>(&self, page_size: usize, mut visit: F) -> Result<ScanStats>
    where
        F: FnMut(ListingRecord),
    {
        let page_size = page_size.max(1);
        let mut offset = 0usize;
        let mut stats = ScanStats::default();
        let mut reported = None;

        loop {
            let page = self.store.active_page(offset, page_size).await?;
            let fetched = page.rows.len();
            reported = page.total.or(reported);
            stats.pages += 1;
            stats.rows += fetched as u64;

            for listing in page.rows {
                visit(listing);
            }
            offset += fetched;

            debug!("Scanned page {} ({} rows, offset {})", stats.pages, fetched, offset);

            if fetched < page_size {
                break;
            }
        }

        if let Some(total) = reported.filter(|t| *t != stats.rows) {
            warn!("Listing store reported {} active rows, scanned {}", total, stats.rows);
        }

        Ok(stats)
    }
}
