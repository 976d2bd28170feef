//! Location resolution against the Portuguese administrative hierarchy.
//!
//! Builds normalized lookup maps from the georef datasets and resolves
//! free-text listing locations to district / municipality / parish.

mod cache;
mod index;
mod service;

pub use cache::{AdminIndexCache, Clock, SystemClock};
pub use index::{
    AdminIndex, CentroidAccumulator, DistrictEntry, IndexStats, MunicipalityEntry, ParishEntry,
};
pub use service::{candidate_keys, LocationResolver, LOCATION_DELIMITERS};
