//! Dashboard aggregation over the listing store.

mod breakdown;
mod engine;

pub use breakdown::{
    compare_labels, Breakdown, BreakdownRow, Totals, UnknownPlacement, UNKNOWN_BUCKET,
};
pub use engine::{
    classify, AggregationEngine, ClassifiedListing, DashboardSnapshot, RegionBreakdowns,
    SourceActivity,
};
