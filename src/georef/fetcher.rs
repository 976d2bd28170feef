//! Paginated fetcher for the georef administrative datasets.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::GeorefConfig;
use crate::error::{DashboardError, Result};
use crate::http::with_query;
use crate::models::{AdminAreaRecord, AdminLevel, GeoPoint};

pub(crate) const PROVIDER: &str = "georef";

/// One page of administrative records
#[derive(Debug, Clone, Default)]
pub struct RecordsPage {
    /// Total row count reported by the provider, when present
    pub total_count: Option<u64>,
    pub records: Vec<AdminAreaRecord>,
}

/// Source of raw administrative records, one page at a time.
#[async_trait]
pub trait AdminSource: Send + Sync {
    async fn fetch_page(&self, level: AdminLevel, limit: usize, offset: usize)
        -> Result<RecordsPage>;
}

/// Raw records for all three levels
#[derive(Debug, Clone, Default)]
pub struct AdminDataset {
    pub districts: Vec<AdminAreaRecord>,
    pub municipalities: Vec<AdminAreaRecord>,
    pub parishes: Vec<AdminAreaRecord>,
}

/// Page through one level until a short page.
///
/// The reported total is only compared against what was read, since it can
/// lag behind inserts made during the walk. Any failed page aborts the whole
/// fetch; earlier pages are dropped.
pub async fn fetch_all(
    source: &dyn AdminSource,
    level: AdminLevel,
    page_size: usize,
) -> Result<Vec<AdminAreaRecord>> {
    let mut offset = 0usize;
    let mut out = Vec::new();
    let mut reported = None;

    loop {
        let page = source.fetch_page(level, page_size, offset).await?;
        let fetched = page.records.len();
        reported = page.total_count.or(reported);
        out.extend(page.records);
        offset += fetched;

        debug!("Fetched {} {} records (offset {})", fetched, level, offset);

        if fetched < page_size {
            break;
        }
    }

    if let Some(total) = reported.filter(|t| *t != out.len() as u64) {
        warn!("{} total reported as {} but {} records were read", level, total, out.len());
    }

    info!("Fetched {} {} records", out.len(), level);
    Ok(out)
}

/// Fetch districts, municipalities and parishes.
///
/// The three levels are independent, so they are requested concurrently.
pub async fn fetch_admin_dataset(source: &dyn AdminSource, page_size: usize) -> Result<AdminDataset> {
    let (districts, municipalities, parishes) = futures::try_join!(
        fetch_all(source, AdminLevel::District, page_size),
        fetch_all(source, AdminLevel::Municipality, page_size),
        fetch_all(source, AdminLevel::Parish, page_size),
    )?;

    Ok(AdminDataset {
        districts,
        municipalities,
        parishes,
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordsResponse<T> {
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Name columns come back either as a plain string or as a one-element list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NameField {
    One(String),
    Many(Vec<String>),
}

impl NameField {
    fn into_name(self) -> Option<String> {
        match self {
            NameField::One(name) => Some(name),
            NameField::Many(names) => names.into_iter().find(|n| !n.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeorefRow {
    #[serde(default)]
    dis_name: Option<NameField>,
    #[serde(default)]
    con_name: Option<NameField>,
    #[serde(default)]
    fre_name: Option<NameField>,
    #[serde(default)]
    geo_point_2d: Option<GeoPoint>,
}

impl GeorefRow {
    /// Blank names are kept; the index builder decides what to drop.
    fn into_record(self, level: AdminLevel) -> AdminAreaRecord {
        let district = self.dis_name.and_then(NameField::into_name);
        let municipality = self.con_name.and_then(NameField::into_name);
        let parish = self.fre_name.and_then(NameField::into_name);

        let (label, municipality, district) = match level {
            AdminLevel::District => (district, None, None),
            AdminLevel::Municipality => (municipality, None, district),
            AdminLevel::Parish => (parish, municipality, district),
        };

        AdminAreaRecord {
            level,
            label: label.unwrap_or_default(),
            municipality,
            district,
            centroid: self.geo_point_2d,
        }
    }
}

fn select_fields(level: AdminLevel) -> &'static str {
    match level {
        AdminLevel::District => "dis_name,geo_point_2d",
        AdminLevel::Municipality => "con_name,dis_name,geo_point_2d",
        AdminLevel::Parish => "fre_name,con_name,dis_name,geo_point_2d",
    }
}

/// HTTP client for the opendatasoft georef catalog
#[derive(Clone)]
pub struct GeorefClient {
    client: Client,
    base_url: String,
}

impl GeorefClient {
    pub fn new(config: &GeorefConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("casadash/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| DashboardError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `{base}/{dataset}/records?{params}`
    pub(crate) fn records_url(&self, dataset: &str, params: &[(&str, &str)]) -> Result<Url> {
        let url = Url::parse(&format!("{}/{}/records", self.base_url, dataset))
            .map_err(|e| DashboardError::Config(format!("invalid georef base url: {}", e)))?;
        Ok(with_query(url, params))
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl AdminSource for GeorefClient {
    async fn fetch_page(
        &self,
        level: AdminLevel,
        limit: usize,
        offset: usize,
    ) -> Result<RecordsPage> {
        let limit_param = limit.to_string();
        let offset_param = offset.to_string();

        let url = self.records_url(
            level.georef_dataset(),
            &[
                ("select", select_fields(level)),
                ("limit", limit_param.as_str()),
                ("offset", offset_param.as_str()),
            ],
        )?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DashboardError::upstream(PROVIDER, e.to_string()))?;

        if !response.status().is_success() {
            return Err(DashboardError::upstream(
                PROVIDER,
                format!(
                    "{} page at offset {} returned status {}",
                    level.georef_dataset(),
                    offset,
                    response.status()
                ),
            ));
        }

        let body: RecordsResponse<GeorefRow> = response
            .json()
            .await
            .map_err(|e| DashboardError::upstream(PROVIDER, format!("malformed payload: {}", e)))?;

        Ok(RecordsPage {
            total_count: body.total_count,
            records: body
                .results
                .into_iter()
                .map(|row| row.into_record(level))
                .collect(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves fixed records in pages; optionally fails at one offset.
    pub(crate) struct StaticAdminSource {
        pub dataset: AdminDataset,
        pub report_total: bool,
        /// Reported instead of the real count when set
        pub stale_total: Option<u64>,
        pub fail_at_offset: Option<usize>,
        pub requests: AtomicUsize,
    }

    impl StaticAdminSource {
        pub fn new(dataset: AdminDataset) -> Self {
            Self {
                dataset,
                report_total: true,
                stale_total: None,
                fail_at_offset: None,
                requests: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AdminSource for StaticAdminSource {
        async fn fetch_page(
            &self,
            level: AdminLevel,
            limit: usize,
            offset: usize,
        ) -> Result<RecordsPage> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.fail_at_offset == Some(offset) {
                return Err(DashboardError::upstream(PROVIDER, "status 503"));
            }
            let records = match level {
                AdminLevel::District => &self.dataset.districts,
                AdminLevel::Municipality => &self.dataset.municipalities,
                AdminLevel::Parish => &self.dataset.parishes,
            };
            Ok(RecordsPage {
                total_count: self
                    .stale_total
                    .or(self.report_total.then_some(records.len() as u64)),
                records: records.iter().skip(offset).take(limit).cloned().collect(),
            })
        }
    }

    fn districts(n: usize) -> AdminDataset {
        AdminDataset {
            districts: (0..n)
                .map(|i| AdminAreaRecord::district(&format!("District {}", i)))
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_all_stops_on_short_page() {
        let mut source = StaticAdminSource::new(districts(250));
        source.report_total = false;

        let records = fetch_all(&source, AdminLevel::District, 100).await.unwrap();
        assert_eq!(records.len(), 250);
        assert_eq!(source.requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_all_reads_trailing_empty_page() {
        let source = StaticAdminSource::new(districts(200));

        let records = fetch_all(&source, AdminLevel::District, 100).await.unwrap();
        assert_eq!(records.len(), 200);
        assert_eq!(source.requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_all_ignores_stale_total() {
        let mut source = StaticAdminSource::new(districts(240));
        source.stale_total = Some(100);

        let records = fetch_all(&source, AdminLevel::District, 100).await.unwrap();
        assert_eq!(records.len(), 240);
        assert_eq!(source.requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_all_discards_partial_results_on_failure() {
        let mut source = StaticAdminSource::new(districts(300));
        source.fail_at_offset = Some(200);

        let err = fetch_all(&source, AdminLevel::District, 100).await.unwrap_err();
        assert!(matches!(err, DashboardError::UpstreamUnavailable { .. }));
    }

    #[test]
    fn test_row_accepts_string_or_list_names() {
        let response: RecordsResponse<GeorefRow> = serde_json::from_value(json!({
            "total_count": 2,
            "results": [
                {
                    "fre_name": ["Alvalade"],
                    "con_name": "Lisboa",
                    "dis_name": ["Lisboa"],
                    "geo_point_2d": {"lon": -9.14, "lat": 38.75},
                    "year": "2013"
                },
                {"fre_name": null, "con_name": "Porto"}
            ]
        }))
        .unwrap();

        let records: Vec<AdminAreaRecord> = response
            .results
            .into_iter()
            .map(|row| row.into_record(AdminLevel::Parish))
            .collect();

        assert_eq!(records[0], AdminAreaRecord::parish("Alvalade", "Lisboa", "Lisboa").with_centroid(38.75, -9.14));
        assert_eq!(records[1].label, "");
        assert_eq!(records[1].district, None);
    }

    #[test]
    fn test_municipality_row_mapping() {
        let row: GeorefRow = serde_json::from_value(json!({
            "con_name": "Matosinhos",
            "dis_name": "Porto"
        }))
        .unwrap();
        assert_eq!(
            row.into_record(AdminLevel::Municipality),
            AdminAreaRecord::municipality("Matosinhos", "Porto")
        );
    }

    #[test]
    fn test_records_url() {
        let client = GeorefClient::new(&GeorefConfig {
            base_url: "https://example.org/datasets/".to_string(),
            ..Default::default()
        })
        .unwrap();
        let url = client
            .records_url(
                AdminLevel::Parish.georef_dataset(),
                &[("select", "fre_name,con_name"), ("limit", "100"), ("offset", "0")],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.org/datasets/georef-portugal-freguesia/records?select=fre_name%2Ccon_name&limit=100&offset=0"
        );
    }
}
