//! Core data models for the dashboard.

pub mod admin;
pub mod listing;
pub mod normalized;
pub mod point;

pub use admin::{AdminAreaRecord, AdminLevel, ResolvedHierarchy};
pub use listing::{ListingRecord, ListingType};
pub use normalized::NormalizedKey;
pub use point::GeoPoint;
