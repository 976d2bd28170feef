//! PostgREST client for the listing store.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::store::{CountQuery, ListingPage, ListingStore, ListingTable};
use crate::config::ListingsConfig;
use crate::error::{DashboardError, Result};
use crate::http::with_query;
use crate::models::ListingRecord;

const PROVIDER: &str = "listing store";

/// Columns the dashboard reads from `listings_normalized`
const LISTING_COLUMNS: &str =
    "id,source,listing_type,title,bedrooms,location_text,price_eur,lat,lng";

/// PostgREST client wrapper with connection configuration
#[derive(Clone)]
pub struct PostgrestClient {
    client: Client,
    rest_url: Url,
}

#[derive(Debug, Deserialize)]
struct SourceRow {
    name: String,
}

impl PostgrestClient {
    pub fn new(config: &ListingsConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            DashboardError::Config(format!("invalid listings.base_url '{}': {}", config.base_url, e))
        })?;
        let rest_url = base
            .join("rest/v1/")
            .map_err(|e| DashboardError::Config(format!("invalid listings.base_url: {}", e)))?;

        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| DashboardError::Config("listings.api_key is not a valid header".into()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| DashboardError::Config("listings.api_key is not a valid header".into()))?;
        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| DashboardError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, rest_url })
    }

    fn table(&self, name: &str) -> Result<Url> {
        self.rest_url
            .join(name)
            .map_err(|e| DashboardError::Config(format!("invalid table url: {}", e)))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| DashboardError::upstream(PROVIDER, e.to_string()))?;

        if !response.status().is_success() {
            return Err(DashboardError::upstream(
                PROVIDER,
                format!("request returned status {}", response.status()),
            ));
        }
        Ok(response)
    }
}

/// Total from a PostgREST `Content-Range` header such as `0-24/3573` or `*/0`.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

#[async_trait]
impl ListingStore for PostgrestClient {
    async fn active_page(&self, offset: usize, limit: usize) -> Result<ListingPage> {
        let url = self.table("listings_normalized")?;
        let offset_param = offset.to_string();
        let limit_param = limit.to_string();

        let url = with_query(
            url,
            &[
                ("select", LISTING_COLUMNS),
                ("is_active", "eq.true"),
                ("order", "id.asc"),
                ("offset", offset_param.as_str()),
                ("limit", limit_param.as_str()),
            ],
        );
        let request = self.client.get(url);

        let rows: Vec<ListingRecord> = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| DashboardError::upstream(PROVIDER, format!("malformed payload: {}", e)))?;

        debug!("Fetched {} listings at offset {}", rows.len(), offset);

        // No count is requested per page; a stale total must not end a scan early.
        Ok(ListingPage { rows, total: None })
    }

    async fn enabled_sources(&self) -> Result<Vec<String>> {
        let url = self.table("sources")?;
        let url = with_query(url, &[("select", "name"), ("enabled", "eq.true")]);
        let request = self.client.get(url);

        let rows: Vec<SourceRow> = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| DashboardError::upstream(PROVIDER, format!("malformed payload: {}", e)))?;

        Ok(rows.into_iter().map(|r| r.name).collect())
    }

    async fn count(&self, query: &CountQuery) -> Result<u64> {
        let url = self.table(query.table.table_name())?;
        let source_filter = format!("eq.{}", query.source);
        let since_filter = query.since.map(|since| format!("gte.{}", since.to_rfc3339()));

        let mut params = vec![("select", "id"), ("source", source_filter.as_str())];
        if let Some(since) = since_filter.as_deref() {
            params.push((query.table.seen_column(), since));
        }
        if query.table == ListingTable::Normalized {
            params.push(("is_active", "eq.true"));
        }

        let request = self
            .client
            .head(with_query(url, &params))
            .header("Prefer", "count=exact");

        let response = self.send(request).await?;
        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| DashboardError::upstream(PROVIDER, "count response without Content-Range"))
    }
}
