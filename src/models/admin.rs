//! Administrative hierarchy types for the Portuguese district → municipality → parish tree.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::point::GeoPoint;
use crate::error::DashboardError;

/// Level of the Portuguese administrative hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AdminLevel {
    /// Distrito (plus the two autonomous regions)
    District,
    /// Concelho / município
    Municipality,
    /// Freguesia
    Parish,
}

impl AdminLevel {
    /// All levels, least specific first
    pub fn all() -> &'static [AdminLevel] {
        &[
            AdminLevel::District,
            AdminLevel::Municipality,
            AdminLevel::Parish,
        ]
    }

    /// Get the field name for this level
    pub fn field_name(&self) -> &'static str {
        match self {
            AdminLevel::District => "district",
            AdminLevel::Municipality => "municipality",
            AdminLevel::Parish => "parish",
        }
    }

    /// Name column of this level in the georef datasets
    pub fn georef_name_field(&self) -> &'static str {
        match self {
            AdminLevel::District => "dis_name",
            AdminLevel::Municipality => "con_name",
            AdminLevel::Parish => "fre_name",
        }
    }

    /// Georef dataset holding the records of this level
    pub fn georef_dataset(&self) -> &'static str {
        match self {
            AdminLevel::District => "georef-portugal-distrito",
            AdminLevel::Municipality => "georef-portugal-concelho",
            AdminLevel::Parish => "georef-portugal-freguesia",
        }
    }
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl FromStr for AdminLevel {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "district" | "distrito" => Ok(AdminLevel::District),
            "municipality" | "concelho" => Ok(AdminLevel::Municipality),
            "parish" | "freguesia" => Ok(AdminLevel::Parish),
            _ => Err(DashboardError::InvalidGeometryLevel(s.to_string())),
        }
    }
}

/// One named administrative unit as delivered by the reference provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminAreaRecord {
    pub level: AdminLevel,

    /// Display name
    pub label: String,

    /// Parent municipality (parishes only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,

    /// Parent district (municipalities and parishes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub centroid: Option<GeoPoint>,
}

impl AdminAreaRecord {
    pub fn district(label: &str) -> Self {
        Self {
            level: AdminLevel::District,
            label: label.to_string(),
            municipality: None,
            district: None,
            centroid: None,
        }
    }

    pub fn municipality(label: &str, district: &str) -> Self {
        Self {
            level: AdminLevel::Municipality,
            label: label.to_string(),
            municipality: None,
            district: Some(district.to_string()),
            centroid: None,
        }
    }

    pub fn parish(label: &str, municipality: &str, district: &str) -> Self {
        Self {
            level: AdminLevel::Parish,
            label: label.to_string(),
            municipality: Some(municipality.to_string()),
            district: Some(district.to_string()),
            centroid: None,
        }
    }

    pub fn with_centroid(mut self, lat: f64, lon: f64) -> Self {
        self.centroid = Some(GeoPoint { lat, lon });
        self
    }
}

/// Best-effort administrative placement of a listing.
///
/// `None` at a level means the resolver could not place the listing there,
/// not that no such unit exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedHierarchy {
    pub district: Option<String>,
    pub municipality: Option<String>,
    pub parish: Option<String>,
}

impl ResolvedHierarchy {
    /// Set the label for a given level
    pub fn set(&mut self, level: AdminLevel, label: String) {
        match level {
            AdminLevel::District => self.district = Some(label),
            AdminLevel::Municipality => self.municipality = Some(label),
            AdminLevel::Parish => self.parish = Some(label),
        }
    }

    /// Get the label for a given level
    pub fn get(&self, level: AdminLevel) -> Option<&str> {
        match level {
            AdminLevel::District => self.district.as_deref(),
            AdminLevel::Municipality => self.municipality.as_deref(),
            AdminLevel::Parish => self.parish.as_deref(),
        }
    }

    pub fn is_unresolved(&self) -> bool {
        self.district.is_none() && self.municipality.is_none() && self.parish.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!("district".parse::<AdminLevel>().unwrap(), AdminLevel::District);
        assert_eq!(" Concelho ".parse::<AdminLevel>().unwrap(), AdminLevel::Municipality);
        assert_eq!("freguesia".parse::<AdminLevel>().unwrap(), AdminLevel::Parish);

        let err = "country".parse::<AdminLevel>().unwrap_err();
        assert!(matches!(err, DashboardError::InvalidGeometryLevel(ref l) if l == "country"));
    }

    #[test]
    fn test_hierarchy_get_set() {
        let mut hierarchy = ResolvedHierarchy::default();
        assert!(hierarchy.is_unresolved());

        hierarchy.set(AdminLevel::Municipality, "Lisboa".to_string());
        assert_eq!(hierarchy.get(AdminLevel::Municipality), Some("Lisboa"));
        assert_eq!(hierarchy.get(AdminLevel::Parish), None);
        assert!(!hierarchy.is_unresolved());
    }
}
