//! TOML configuration for the dashboard binaries.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{DashboardError, Result};

pub const DEFAULT_GEOREF_BASE_URL: &str =
    "https://public.opendatasoft.com/api/explore/v2.1/catalog/datasets";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub georef: GeorefConfig,
    pub listings: ListingsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeorefConfig {
    pub base_url: String,
    /// Upstream caps `limit` at 100.
    pub page_size: usize,
    pub timeout_secs: u64,
}

impl Default for GeorefConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEOREF_BASE_URL.to_string(),
            page_size: 100,
            timeout_secs: 30,
        }
    }
}

impl GeorefConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListingsConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_listings_timeout")]
    pub timeout_secs: u64,
}

fn default_listings_timeout() -> u64 {
    60
}

impl ListingsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_hours: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_hours: 12 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours)
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct AggregationConfig {
    pub page_size: usize,
    pub drilldown_page_size: usize,
    /// Maximum concurrent count queries when collecting per-source metrics.
    pub source_fanout: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            page_size: 5000,
            drilldown_page_size: 1000,
            source_fanout: 4,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| DashboardError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.georef.page_size == 0
            || self.aggregation.page_size == 0
            || self.aggregation.drilldown_page_size == 0
        {
            return Err(DashboardError::Config(
                "page sizes must be greater than zero".to_string(),
            ));
        }
        if self.aggregation.source_fanout == 0 {
            return Err(DashboardError::Config(
                "aggregation.source_fanout must be greater than zero".to_string(),
            ));
        }
        if self.cache.ttl_hours <= 0 {
            return Err(DashboardError::Config(
                "cache.ttl_hours must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
