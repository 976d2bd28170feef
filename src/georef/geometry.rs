//! Boundary polygons for a single administrative unit.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::fetcher::{GeorefClient, RecordsResponse, PROVIDER};
use crate::error::{DashboardError, Result};
use crate::models::AdminLevel;

#[derive(Debug, Deserialize)]
struct ShapeRow {
    #[serde(default)]
    geo_shape: Option<Value>,
}

/// Looks up boundary geometry by exact label
pub struct GeometryFetcher {
    client: GeorefClient,
}

impl GeometryFetcher {
    pub fn new(client: GeorefClient) -> Self {
        Self { client }
    }

    /// Fetch the boundary of the unit named `label` at `level`.
    ///
    /// `level` is validated before any request is made. Returns `Ok(None)`
    /// when the provider has no shape for that label.
    pub async fn boundary(&self, level: &str, label: &str) -> Result<Option<MultiPolygon<f64>>> {
        let level: AdminLevel = level.parse()?;
        let where_clause = exact_label_clause(level, label);

        debug!("Geometry lookup {} where {}", level, where_clause);

        let url = self.client.records_url(
            level.georef_dataset(),
            &[
                ("select", "geo_shape"),
                ("where", where_clause.as_str()),
                ("limit", "1"),
            ],
        )?;

        let response = self
            .client
            .http()
            .get(url)
            .send()
            .await
            .map_err(|e| DashboardError::upstream(PROVIDER, e.to_string()))?;

        if !response.status().is_success() {
            return Err(DashboardError::upstream(
                PROVIDER,
                format!("geometry lookup returned status {}", response.status()),
            ));
        }

        let body: RecordsResponse<ShapeRow> = response
            .json()
            .await
            .map_err(|e| DashboardError::upstream(PROVIDER, format!("malformed payload: {}", e)))?;

        Ok(body
            .results
            .into_iter()
            .next()
            .and_then(|row| row.geo_shape)
            .and_then(|shape| parse_geo_shape(&shape)))
    }
}

/// `con_name="Vila Nova de Gaia"` with quotes and backslashes escaped.
pub fn exact_label_clause(level: AdminLevel, label: &str) -> String {
    let escaped = label.trim().replace('\\', "\\\\").replace('"', "\\\"");
    format!("{}=\"{}\"", level.georef_name_field(), escaped)
}

/// Convert a GeoJSON Feature or bare geometry into a MultiPolygon.
///
/// Only Polygon and MultiPolygon geometries are accepted.
pub fn parse_geo_shape(shape: &Value) -> Option<MultiPolygon<f64>> {
    let geometry = if shape["type"] == "Feature" {
        &shape["geometry"]
    } else {
        shape
    };

    let coordinates = geometry["coordinates"].as_array()?;
    match geometry["type"].as_str()? {
        "Polygon" => parse_polygon(coordinates).map(|p| MultiPolygon::new(vec![p])),
        "MultiPolygon" => {
            let polygons: Vec<Polygon<f64>> = coordinates
                .iter()
                .filter_map(|p| p.as_array().and_then(|rings| parse_polygon(rings)))
                .collect();
            if polygons.is_empty() {
                None
            } else {
                Some(MultiPolygon::new(polygons))
            }
        }
        _ => None,
    }
}

fn parse_polygon(rings: &[Value]) -> Option<Polygon<f64>> {
    let mut rings = rings.iter().filter_map(parse_ring);
    let exterior = rings.next()?;
    Some(Polygon::new(exterior, rings.collect()))
}

fn parse_ring(ring: &Value) -> Option<LineString<f64>> {
    let coords: Vec<Coord<f64>> = ring
        .as_array()?
        .iter()
        .filter_map(|pos| {
            let pos = pos.as_array()?;
            Some(Coord {
                x: pos.first()?.as_f64()?,
                y: pos.get(1)?.as_f64()?,
            })
        })
        .collect();

    // A closed ring needs at least 4 positions
    if coords.len() < 4 {
        return None;
    }
    Some(LineString::new(coords))
}
