//! Bucket counters and their ordering.

use hashbrown::HashMap;
use serde::Serialize;
use std::cmp::Ordering;

use crate::models::{ListingType, NormalizedKey};

/// Group key for rows that could not be placed in a bucket
pub const UNKNOWN_BUCKET: &str = "Unknown";

/// Buy/rent counters. `total` also includes listings that are neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub buy: u64,
    pub rent: u64,
    pub total: u64,
}

impl Totals {
    pub fn record(&mut self, listing_type: ListingType) {
        match listing_type {
            ListingType::Buy => self.buy += 1,
            ListingType::Rent => self.rent += 1,
            ListingType::Other => {}
        }
        self.total += 1;
    }
}

/// One bucket of a breakdown as served to the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakdownRow {
    pub group_key: String,
    pub buy_count: u64,
    pub rent_count: u64,
    pub total_count: u64,
}

/// Where the `Unknown` bucket goes when sorting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownPlacement {
    /// Sorted by count like any other bucket
    ByCount,
    /// Always last
    Last,
}

/// Counters keyed by group label
#[derive(Debug, Clone, Default)]
pub struct Breakdown {
    buckets: HashMap<String, Totals>,
}

impl Breakdown {
    pub fn record(&mut self, key: &str, listing_type: ListingType) {
        match self.buckets.get_mut(key) {
            Some(totals) => totals.record(listing_type),
            None => {
                let mut totals = Totals::default();
                totals.record(listing_type);
                self.buckets.insert(key.to_string(), totals);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Rows ordered by descending total, ties by [`compare_labels`].
    pub fn into_rows(self, unknown: UnknownPlacement) -> Vec<BreakdownRow> {
        let mut rows: Vec<BreakdownRow> = self
            .buckets
            .into_iter()
            .map(|(group_key, totals)| BreakdownRow {
                group_key,
                buy_count: totals.buy,
                rent_count: totals.rent,
                total_count: totals.total,
            })
            .collect();

        rows.sort_by(|a, b| {
            if unknown == UnknownPlacement::Last {
                let a_unknown = a.group_key == UNKNOWN_BUCKET;
                let b_unknown = b.group_key == UNKNOWN_BUCKET;
                if a_unknown != b_unknown {
                    return a_unknown.cmp(&b_unknown);
                }
            }
            b.total_count
                .cmp(&a.total_count)
                .then_with(|| compare_labels(&a.group_key, &b.group_key))
        });
        rows
    }
}

/// Ascending label order that ignores case and diacritics ("Évora" < "Faro").
/// Labels equal under that folding fall back to plain string order.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    NormalizedKey::new(a)
        .cmp(&NormalizedKey::new(b))
        .then_with(|| a.cmp(b))
}
