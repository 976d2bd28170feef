//! Casadash - resolution and aggregation core for a Portuguese listings dashboard
//!
//! This library provides the shared modules for the dashboard server and CLI
//! binaries: admin reference fetching, location resolution, typology
//! inference and paginated aggregation.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod georef;
pub mod http;
pub mod listings;
pub mod models;
pub mod resolver;
pub mod typology;
pub mod zone;

pub use aggregate::{AggregationEngine, DashboardSnapshot};
pub use error::{DashboardError, Result};
pub use models::{AdminLevel, ListingRecord, NormalizedKey, ResolvedHierarchy};
pub use resolver::{AdminIndexCache, LocationResolver};
pub use zone::Zone;
