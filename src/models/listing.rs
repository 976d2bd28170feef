//! Listing rows as read from the listing store.

use serde::{Deserialize, Deserializer, Serialize};

use super::point::GeoPoint;

/// Buy/rent classification of a listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Buy,
    Rent,
    /// Anything the store carries that is neither buy nor rent
    #[default]
    Other,
}

impl ListingType {
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" | "sale" | "venda" | "comprar" => ListingType::Buy,
            "rent" | "arrendar" | "arrendamento" => ListingType::Rent,
            _ => ListingType::Other,
        }
    }
}

impl<'de> Deserialize<'de> for ListingType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(ListingType::classify)
            .unwrap_or(ListingType::Other))
    }
}

/// Active listing row.
///
/// Only the fields the dashboard core consumes are modelled; anything else the
/// store returns is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Stable identity used for cursor ordering
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,

    #[serde(default = "unknown_source", deserialize_with = "source_or_unknown")]
    pub source: String,

    #[serde(default)]
    pub listing_type: ListingType,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub bedrooms: Option<f64>,

    #[serde(default)]
    pub location_text: Option<String>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub price_eur: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub lat: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub lng: Option<f64>,
}

impl ListingRecord {
    pub fn new(id: &str, source: &str, listing_type: ListingType) -> Self {
        Self {
            id: id.to_string(),
            source: source.to_string(),
            listing_type,
            title: None,
            bedrooms: None,
            location_text: None,
            price_eur: None,
            lat: None,
            lng: None,
        }
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location_text = Some(location.to_string());
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_bedrooms(mut self, bedrooms: f64) -> Self {
        self.bedrooms = Some(bedrooms);
        self
    }

    pub fn with_coordinates(mut self, lat: f64, lng: f64) -> Self {
        self.lat = Some(lat);
        self.lng = Some(lng);
        self
    }

    /// Coordinates, when both are present and in range
    pub fn position(&self) -> Option<GeoPoint> {
        GeoPoint::checked(self.lat?, self.lng?)
    }
}

fn unknown_source() -> String {
    "unknown".to_string()
}

fn source_or_unknown<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(unknown_source))
}

fn id_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "listing id must be a string or number, got {}",
            other
        ))),
    }
}

/// Accepts numbers and numeric strings; anything else becomes `None`.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}
