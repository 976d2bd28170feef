//! HTTP routes for the dashboard API.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use casadash::aggregate::{AggregationEngine, ClassifiedListing, DashboardSnapshot, SourceActivity};
use casadash::georef::GeometryFetcher;
use casadash::models::{AdminLevel, ResolvedHierarchy};
use casadash::resolver::AdminIndexCache;
use casadash::DashboardError;

/// Application state shared across handlers
pub struct AppState {
    pub engine: AggregationEngine,
    pub cache: Arc<AdminIndexCache>,
    pub geometry: GeometryFetcher,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/dashboard", get(dashboard_handler))
        .route("/v1/drilldown/region", get(region_drilldown_handler))
        .route("/v1/drilldown/typology", get(typology_drilldown_handler))
        .route("/v1/drilldown/source", get(source_drilldown_handler))
        .route("/v1/resolve", get(resolve_handler))
        .route("/v1/geometry", get(geometry_handler))
        .route("/v1/sources/activity", get(source_activity_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(context: &str, e: DashboardError) -> (StatusCode, String) {
    let status = match &e {
        DashboardError::InvalidGeometryLevel(_) => StatusCode::BAD_REQUEST,
        DashboardError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
        DashboardError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("{} failed: {}", context, e);
    } else {
        tracing::debug!("{} rejected: {}", context, e);
    }
    (status, e.to_string())
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let built_at = state.cache.built_at().await;
    Json(HealthResponse {
        status: "ok",
        admin_index_built_at: built_at,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    admin_index_built_at: Option<DateTime<Utc>>,
}

/// Full dashboard snapshot
async fn dashboard_handler(State(state): State<Arc<AppState>>) -> ApiResult<DashboardSnapshot> {
    let snapshot = state
        .engine
        .aggregate()
        .await
        .map_err(|e| error_response("Aggregation", e))?;
    Ok(Json(snapshot))
}

#[derive(Deserialize)]
struct RegionParams {
    /// district, municipality or parish
    level: String,
    label: String,
}

#[derive(Deserialize)]
struct LabelParams {
    label: String,
}

#[derive(Deserialize)]
struct SourceParams {
    name: String,
}

#[derive(Serialize)]
struct DrilldownResponse {
    count: usize,
    rows: Vec<ClassifiedListing>,
}

impl From<Vec<ClassifiedListing>> for DrilldownResponse {
    fn from(rows: Vec<ClassifiedListing>) -> Self {
        Self {
            count: rows.len(),
            rows,
        }
    }
}

async fn region_drilldown_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RegionParams>,
) -> ApiResult<DrilldownResponse> {
    let level: AdminLevel = params
        .level
        .parse()
        .map_err(|e| error_response("Region drill-down", e))?;

    let rows = state
        .engine
        .rows_for_region(level, &params.label)
        .await
        .map_err(|e| error_response("Region drill-down", e))?;
    Ok(Json(rows.into()))
}

async fn typology_drilldown_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LabelParams>,
) -> ApiResult<DrilldownResponse> {
    let rows = state
        .engine
        .rows_for_typology(&params.label)
        .await
        .map_err(|e| error_response("Typology drill-down", e))?;
    Ok(Json(rows.into()))
}

async fn source_drilldown_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SourceParams>,
) -> ApiResult<DrilldownResponse> {
    let rows = state
        .engine
        .rows_for_source(&params.name)
        .await
        .map_err(|e| error_response("Source drill-down", e))?;
    Ok(Json(rows.into()))
}

#[derive(Deserialize)]
struct ResolveParams {
    text: String,
}

#[derive(Serialize)]
struct ResolveResponse {
    text: String,
    #[serde(flatten)]
    resolved: ResolvedHierarchy,
}

/// Resolve one free-text location
async fn resolve_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolveParams>,
) -> ApiResult<ResolveResponse> {
    let resolver = state
        .cache
        .resolver()
        .await
        .map_err(|e| error_response("Resolve", e))?;

    let resolved = resolver.resolve(&params.text);
    Ok(Json(ResolveResponse {
        text: params.text,
        resolved,
    }))
}

#[derive(Serialize)]
struct GeometryResponse {
    level: String,
    label: String,
    /// GeoJSON MultiPolygon, null when the provider has no shape
    geometry: Option<Value>,
}

/// Boundary of one admin unit
async fn geometry_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RegionParams>,
) -> ApiResult<GeometryResponse> {
    let shape = state
        .geometry
        .boundary(&params.level, &params.label)
        .await
        .map_err(|e| error_response("Geometry lookup", e))?;

    Ok(Json(GeometryResponse {
        level: params.level,
        label: params.label,
        geometry: shape.as_ref().map(multipolygon_geojson),
    }))
}

fn multipolygon_geojson(shape: &MultiPolygon<f64>) -> Value {
    let polygons: Vec<Vec<Vec<[f64; 2]>>> = shape
        .0
        .iter()
        .map(|polygon| {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
                .collect()
        })
        .collect();

    json!({
        "type": "MultiPolygon",
        "coordinates": polygons,
    })
}

#[derive(Deserialize)]
struct ActivityParams {
    /// RFC 3339 lower bound on fetch / last-seen time
    since: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct ActivityResponse {
    sources: Vec<SourceActivity>,
}

async fn source_activity_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ActivityParams>,
) -> ApiResult<ActivityResponse> {
    let sources = state
        .engine
        .source_activity(params.since)
        .await
        .map_err(|e| error_response("Source activity", e))?;
    Ok(Json(ActivityResponse { sources }))
}
