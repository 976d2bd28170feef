//! Saved search zones and listing membership.

use geo::{Contains, Distance, Haversine, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::models::{AdminLevel, ListingRecord, NormalizedKey, ResolvedHierarchy};
use crate::resolver::LocationResolver;

/// GeoJSON-style polygon; only the first ring is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonShape {
    #[serde(default)]
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

impl PolygonShape {
    fn exterior(&self) -> Option<Polygon<f64>> {
        let ring = self.coordinates.first()?;
        if ring.len() < 3 {
            return None;
        }
        let line: LineString<f64> = ring.iter().map(|[lng, lat]| (*lng, *lat)).collect();
        Some(Polygon::new(line, vec![]))
    }
}

/// One admin unit picked by the user. Empty levels are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminSelection {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub municipality: Option<String>,
    #[serde(default, alias = "freguesia")]
    pub parish: Option<String>,
}

impl AdminSelection {
    fn level(&self, level: AdminLevel) -> Option<NormalizedKey> {
        let label = match level {
            AdminLevel::District => self.district.as_deref(),
            AdminLevel::Municipality => self.municipality.as_deref(),
            AdminLevel::Parish => self.parish.as_deref(),
        };
        label.and_then(NormalizedKey::non_empty)
    }

    fn is_empty(&self) -> bool {
        let country = self.country.as_deref().and_then(NormalizedKey::non_empty);
        country.is_none() && AdminLevel::all().iter().all(|l| self.level(*l).is_none())
    }

    fn matches(&self, resolved: &ResolvedHierarchy) -> bool {
        if let Some(country) = self.country.as_deref().and_then(NormalizedKey::non_empty) {
            // The admin index only covers Portugal
            if !matches!(country.as_str(), "pt" | "portugal") {
                return false;
            }
        }

        AdminLevel::all().iter().all(|level| match self.level(*level) {
            Some(wanted) => resolved
                .get(*level)
                .map(|label| NormalizedKey::new(label) == wanted)
                .unwrap_or(false),
            None => true,
        })
    }
}

/// Admin selections as stored, including the old single-parish shape.
#[derive(Debug, Default, Deserialize)]
struct RawAdminCodes {
    #[serde(default)]
    selections: Option<Vec<AdminSelection>>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    parish: Option<String>,
    #[serde(default)]
    freguesia: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Set of admin units a zone covers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAdminCodes")]
pub struct AdminCodes {
    pub selections: Vec<AdminSelection>,
}

impl From<RawAdminCodes> for AdminCodes {
    fn from(raw: RawAdminCodes) -> Self {
        if let Some(selections) = raw.selections {
            return Self { selections };
        }

        let legacy = [raw.parish, raw.freguesia, raw.name]
            .into_iter()
            .flatten()
            .find(|p| !p.trim().is_empty());

        let selections = legacy
            .map(|parish| {
                vec![AdminSelection {
                    country: Some(raw.country.unwrap_or_else(|| "PT".to_string())),
                    parish: Some(parish),
                    ..Default::default()
                }]
            })
            .unwrap_or_default();

        Self { selections }
    }
}

/// A user-defined search area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "zone_type", rename_all = "snake_case")]
pub enum Zone {
    Radius {
        center_lat: f64,
        center_lng: f64,
        radius_meters: f64,
    },
    Polygon {
        polygon_geojson: PolygonShape,
    },
    Admin {
        admin_codes: AdminCodes,
    },
}

impl Zone {
    /// Whether `listing` falls inside this zone.
    ///
    /// Geometric zones need listing coordinates; admin zones resolve the
    /// listing's location text. A selection with no levels set is skipped.
    pub fn matches(&self, listing: &ListingRecord, resolver: &LocationResolver) -> bool {
        match self {
            Zone::Radius {
                center_lat,
                center_lng,
                radius_meters,
            } => {
                let Some(position) = listing.position() else {
                    return false;
                };
                if !radius_meters.is_finite() || *radius_meters < 0.0 {
                    return false;
                }
                let center = geo::Point::new(*center_lng, *center_lat);
                Haversine.distance(center, position.to_point()) <= *radius_meters
            }
            Zone::Polygon { polygon_geojson } => {
                let (Some(position), Some(polygon)) = (listing.position(), polygon_geojson.exterior())
                else {
                    return false;
                };
                polygon.contains(&position.to_point())
            }
            Zone::Admin { admin_codes } => {
                let selections: Vec<&AdminSelection> = admin_codes
                    .selections
                    .iter()
                    .filter(|s| !s.is_empty())
                    .collect();
                if selections.is_empty() {
                    return false;
                }
                let resolved = resolver.resolve_opt(listing.location_text.as_deref());
                selections.iter().any(|s| s.matches(&resolved))
            }
        }
    }
}
