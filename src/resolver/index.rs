//! Normalized lookup maps over the administrative hierarchy.

use hashbrown::{HashMap, HashSet};
use serde::Serialize;
use tracing::{debug, info};

use crate::georef::AdminDataset;
use crate::models::{AdminAreaRecord, AdminLevel, GeoPoint, NormalizedKey};

/// Running mean of the centroids seen for one key
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CentroidAccumulator {
    pub point: Option<GeoPoint>,
    pub samples: u32,
}

impl CentroidAccumulator {
    /// Weighted running average; the result does not depend on arrival order.
    fn add(&mut self, point: Option<GeoPoint>) {
        let Some(p) = point else {
            return;
        };
        self.samples += 1;
        let n = f64::from(self.samples);
        self.point = Some(match self.point {
            None => p,
            Some(cur) => GeoPoint {
                lat: cur.lat + (p.lat - cur.lat) / n,
                lon: cur.lon + (p.lon - cur.lon) / n,
            },
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistrictEntry {
    pub label: String,
    pub centroid: CentroidAccumulator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MunicipalityEntry {
    pub label: String,
    pub district: String,
    pub centroid: CentroidAccumulator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParishEntry {
    pub label: String,
    pub municipality: String,
    pub district: String,
    pub centroid: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub districts: usize,
    pub municipalities: usize,
    pub parishes: usize,
    /// Parish names shared by more than one municipality
    pub homonym_parishes: usize,
}

/// Immutable district / municipality / parish lookup tables.
///
/// Every key is a [`NormalizedKey`] of the unit's own label.
#[derive(Debug, Clone, Default)]
pub struct AdminIndex {
    districts: HashMap<NormalizedKey, DistrictEntry>,
    municipalities: HashMap<NormalizedKey, MunicipalityEntry>,
    parishes: HashMap<NormalizedKey, ParishEntry>,
    /// (municipality, parish) → parishes, for parish names reused across
    /// municipalities. Several entries when municipality names repeat too.
    parishes_by_municipality: HashMap<(NormalizedKey, NormalizedKey), Vec<ParishEntry>>,
    homonym_parishes: usize,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl AdminIndex {
    pub fn from_dataset(dataset: &AdminDataset) -> Self {
        Self::build(
            dataset
                .districts
                .iter()
                .chain(&dataset.municipalities)
                .chain(&dataset.parishes),
        )
    }

    /// Build the index from records of any level.
    ///
    /// Records with a blank label, or a blank required parent, are skipped.
    /// On a key collision the later record's label and parents win; for
    /// districts and municipalities the centroids of all colliding records
    /// are averaged. Parents named only by their children are registered
    /// without overriding an explicit record.
    pub fn build<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a AdminAreaRecord>,
    {
        let mut district_records = Vec::new();
        let mut municipality_records = Vec::new();
        let mut parish_records = Vec::new();

        for record in records {
            match record.level {
                AdminLevel::District => district_records.push(record),
                AdminLevel::Municipality => municipality_records.push(record),
                AdminLevel::Parish => parish_records.push(record),
            }
        }

        let mut index = AdminIndex::default();
        let mut skipped = 0usize;

        for record in district_records {
            let Some(key) = NormalizedKey::non_empty(&record.label) else {
                skipped += 1;
                continue;
            };
            let entry = index
                .districts
                .entry(key)
                .or_insert_with(|| DistrictEntry {
                    label: String::new(),
                    centroid: CentroidAccumulator::default(),
                });
            entry.label = record.label.trim().to_string();
            entry.centroid.add(record.centroid);
        }

        let mut valid_municipalities = Vec::with_capacity(municipality_records.len());
        for record in municipality_records {
            let (Some(key), Some(district)) = (
                NormalizedKey::non_empty(&record.label),
                non_blank(record.district.as_ref()),
            ) else {
                skipped += 1;
                continue;
            };
            let entry = index
                .municipalities
                .entry(key)
                .or_insert_with(|| MunicipalityEntry {
                    label: String::new(),
                    district: String::new(),
                    centroid: CentroidAccumulator::default(),
                });
            entry.label = record.label.trim().to_string();
            entry.district = district.to_string();
            entry.centroid.add(record.centroid);
            valid_municipalities.push(record);
        }

        let mut valid_parishes = Vec::with_capacity(parish_records.len());
        for record in parish_records {
            let (Some(key), Some(municipality), Some(district)) = (
                NormalizedKey::non_empty(&record.label),
                non_blank(record.municipality.as_ref()),
                non_blank(record.district.as_ref()),
            ) else {
                skipped += 1;
                continue;
            };
            valid_parishes.push((key, record.label.trim(), municipality, district, record.centroid));
        }

        // Parents implied by children
        for record in &valid_municipalities {
            if let Some(district) = non_blank(record.district.as_ref()) {
                index.register_district(district);
            }
        }
        for (_, _, municipality, district, _) in &valid_parishes {
            index.register_district(district);
            index.register_municipality(municipality, district);
        }

        // Point municipalities at the canonical district label
        let districts = &index.districts;
        for entry in index.municipalities.values_mut() {
            if let Some(district) = districts.get(&NormalizedKey::new(&entry.district)) {
                entry.district = district.label.clone();
            }
        }

        // A parish keeps its own district; the municipality entry only supplies
        // the canonical label when it lies in that same district.
        let mut units_per_name: HashMap<NormalizedKey, HashSet<(NormalizedKey, NormalizedKey)>> =
            HashMap::new();
        for (key, label, municipality, district, centroid) in valid_parishes {
            let municipality_key = NormalizedKey::new(municipality);
            let district_key = NormalizedKey::new(district);
            let district = index
                .districts
                .get(&district_key)
                .map(|d| d.label.clone())
                .unwrap_or_else(|| district.to_string());
            let municipality = match index.municipalities.get(&municipality_key) {
                Some(m) if NormalizedKey::new(&m.district) == district_key => m.label.clone(),
                _ => municipality.to_string(),
            };
            let entry = ParishEntry {
                label: label.to_string(),
                municipality,
                district,
                centroid,
            };

            units_per_name
                .entry(key.clone())
                .or_default()
                .insert((district_key.clone(), municipality_key.clone()));

            let same_unit = index
                .parishes_by_municipality
                .entry((municipality_key, key.clone()))
                .or_default();
            match same_unit
                .iter_mut()
                .find(|p| NormalizedKey::new(&p.district) == district_key)
            {
                Some(existing) => *existing = entry.clone(),
                None => same_unit.push(entry.clone()),
            }
            index.parishes.insert(key, entry);
        }
        index.homonym_parishes = units_per_name.values().filter(|units| units.len() > 1).count();

        if skipped > 0 {
            debug!("Skipped {} admin records with blank names", skipped);
        }
        let stats = index.stats();
        info!(
            "Admin index built: {} districts, {} municipalities, {} parishes ({} shared parish names)",
            stats.districts, stats.municipalities, stats.parishes, stats.homonym_parishes
        );

        index
    }

    fn register_district(&mut self, label: &str) {
        self.districts
            .entry(NormalizedKey::new(label))
            .or_insert_with(|| DistrictEntry {
                label: label.to_string(),
                centroid: CentroidAccumulator::default(),
            });
    }

    fn register_municipality(&mut self, label: &str, district: &str) {
        self.municipalities
            .entry(NormalizedKey::new(label))
            .or_insert_with(|| MunicipalityEntry {
                label: label.to_string(),
                district: district.to_string(),
                centroid: CentroidAccumulator::default(),
            });
    }

    pub fn district(&self, key: &NormalizedKey) -> Option<&DistrictEntry> {
        self.districts.get(key)
    }

    pub fn municipality(&self, key: &NormalizedKey) -> Option<&MunicipalityEntry> {
        self.municipalities.get(key)
    }

    pub fn parish(&self, key: &NormalizedKey) -> Option<&ParishEntry> {
        self.parishes.get(key)
    }

    /// Parishes named `parish` inside a municipality named `municipality`.
    ///
    /// More than one entry only when the municipality name itself is shared
    /// by several districts.
    pub fn parishes_in_municipality(
        &self,
        municipality: &NormalizedKey,
        parish: &NormalizedKey,
    ) -> &[ParishEntry] {
        self.parishes_by_municipality
            .get(&(municipality.clone(), parish.clone()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            districts: self.districts.len(),
            municipalities: self.municipalities.len(),
            parishes: self.parishes.len(),
            homonym_parishes: self.homonym_parishes,
        }
    }

    /// Iterate over all parishes (for debugging and zone pickers)
    pub fn parishes(&self) -> impl Iterator<Item = &ParishEntry> {
        self.parishes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> NormalizedKey {
        NormalizedKey::new(s)
    }

    #[test]
    fn test_blank_parents_are_dropped() {
        let mut orphan = AdminAreaRecord::parish("Orfã", "", "Lisboa");
        let mut no_district = AdminAreaRecord::parish("Sem Distrito", "Lisboa", "  ");
        let index = AdminIndex::build(&[
            AdminAreaRecord::parish("Alvalade", "Lisboa", "Lisboa"),
            orphan.clone(),
            no_district.clone(),
        ]);

        assert!(index.parish(&key("Alvalade")).is_some());
        assert!(index.parish(&key("Orfa")).is_none());
        assert!(index.parish(&key("Sem Distrito")).is_none());
        for parish in index.parishes() {
            assert!(!parish.municipality.is_empty());
            assert!(!parish.district.is_empty());
        }

        orphan.municipality = None;
        no_district.district = None;
        let index = AdminIndex::build(&[orphan, no_district]);
        assert_eq!(index.stats().parishes, 0);
    }

    #[test]
    fn test_municipality_without_district_dropped() {
        let mut record = AdminAreaRecord::municipality("Sintra", "Lisboa");
        record.district = None;
        let index = AdminIndex::build(&[record]);
        assert!(index.municipality(&key("Sintra")).is_none());
    }

    #[test]
    fn test_keys_are_normalized() {
        let index = AdminIndex::build(&[AdminAreaRecord::district("Évora ")]);
        let entry = index.district(&key("evora")).unwrap();
        assert_eq!(entry.label, "Évora");
    }

    #[test]
    fn test_later_record_overwrites_label() {
        let index = AdminIndex::build(&[
            AdminAreaRecord::municipality("LISBOA", "Lisboa"),
            AdminAreaRecord::municipality("Lisboa", "Lisboa"),
        ]);
        assert_eq!(index.municipality(&key("lisboa")).unwrap().label, "Lisboa");
    }

    #[test]
    fn test_centroid_merge_is_order_invariant() {
        let rows = vec![
            AdminAreaRecord::district("Porto").with_centroid(41.0, -8.0),
            AdminAreaRecord::district("Porto").with_centroid(41.4, -8.6),
            AdminAreaRecord::district("Porto"),
            AdminAreaRecord::district("Porto").with_centroid(41.2, -8.1),
        ];
        let forward = AdminIndex::build(&rows);
        let reversed: Vec<_> = rows.iter().rev().cloned().collect();
        let backward = AdminIndex::build(&reversed);

        let a = forward.district(&key("porto")).unwrap().centroid;
        let b = backward.district(&key("porto")).unwrap().centroid;
        assert_eq!(a.samples, 3);
        assert_eq!(b.samples, 3);

        let (pa, pb) = (a.point.unwrap(), b.point.unwrap());
        assert!((pa.lat - 41.2).abs() < 1e-9);
        assert!((pa.lon - -8.233333333333333).abs() < 1e-9);
        assert!((pa.lat - pb.lat).abs() < 1e-9);
        assert!((pa.lon - pb.lon).abs() < 1e-9);
    }

    #[test]
    fn test_parents_implied_by_children() {
        let index = AdminIndex::build(&[
            AdminAreaRecord::district("Lisboa"),
            AdminAreaRecord::parish("Cedofeita", "Porto", "Porto"),
        ]);

        assert_eq!(index.district(&key("porto")).unwrap().label, "Porto");
        let municipality = index.municipality(&key("porto")).unwrap();
        assert_eq!(municipality.district, "Porto");
        assert_eq!(index.stats().districts, 2);
    }

    #[test]
    fn test_implied_parent_never_overrides_explicit_record() {
        let explicit = AdminAreaRecord::district("Setúbal").with_centroid(38.5, -8.9);
        let child = AdminAreaRecord::municipality("Almada", "SETUBAL");

        let a = AdminIndex::build(&[explicit.clone(), child.clone()]);
        let b = AdminIndex::build(&[child, explicit]);

        for index in [a, b] {
            let district = index.district(&key("setubal")).unwrap();
            assert_eq!(district.label, "Setúbal");
            assert_eq!(district.centroid.samples, 1);
            // Municipality parent is rewritten to the canonical label
            assert_eq!(index.municipality(&key("almada")).unwrap().district, "Setúbal");
        }
    }

    #[test]
    fn test_parish_uses_canonical_parent_labels() {
        let index = AdminIndex::build(&[
            AdminAreaRecord::district("Lisboa"),
            AdminAreaRecord::municipality("Lisboa", "Lisboa"),
            AdminAreaRecord::parish("Alvalade", "LISBOA", "lisboa"),
        ]);
        let parish = index.parish(&key("alvalade")).unwrap();
        assert_eq!(parish.municipality, "Lisboa");
        assert_eq!(parish.district, "Lisboa");
    }

    #[test]
    fn test_homonym_parishes_indexed_by_municipality() {
        let index = AdminIndex::build(&[
            AdminAreaRecord::parish("Santa Maria", "Lagos", "Faro"),
            AdminAreaRecord::parish("Santa Maria", "Bragança", "Bragança"),
        ]);

        // Plain lookup: last one wins
        assert_eq!(index.parish(&key("santa maria")).unwrap().municipality, "Bragança");
        let lagos = index.parishes_in_municipality(&key("lagos"), &key("santa maria"));
        assert_eq!(lagos.len(), 1);
        assert_eq!(lagos[0].district, "Faro");
        assert_eq!(index.stats().homonym_parishes, 1);
    }

    #[test]
    fn test_parish_keeps_district_under_shared_municipality_name() {
        let index = AdminIndex::build(&[
            AdminAreaRecord::district("Faro"),
            AdminAreaRecord::district("Ponta Delgada"),
            AdminAreaRecord::municipality("Lagoa", "Faro"),
            AdminAreaRecord::municipality("Lagoa", "Ponta Delgada"),
            AdminAreaRecord::parish("Ferragudo", "Lagoa", "FARO"),
            AdminAreaRecord::parish("Rosário", "Lagoa", "Faro"),
            AdminAreaRecord::parish("Rosário", "Lagoa", "Ponta Delgada"),
        ]);

        let ferragudo = index.parish(&key("ferragudo")).unwrap();
        assert_eq!(ferragudo.municipality, "Lagoa");
        assert_eq!(ferragudo.district, "Faro");

        let rosario = index.parishes_in_municipality(&key("lagoa"), &key("rosario"));
        let mut districts: Vec<&str> = rosario.iter().map(|p| p.district.as_str()).collect();
        districts.sort();
        assert_eq!(districts, vec!["Faro", "Ponta Delgada"]);
        assert_eq!(index.stats().homonym_parishes, 1);
    }

    #[test]
    fn test_repeated_parish_record_is_not_a_homonym() {
        let index = AdminIndex::build(&[
            AdminAreaRecord::parish("Alvalade", "Lisboa", "Lisboa"),
            AdminAreaRecord::parish("ALVALADE", "Lisboa", "Lisboa"),
        ]);
        assert_eq!(index.parishes_in_municipality(&key("lisboa"), &key("alvalade")).len(), 1);
        assert_eq!(index.parish(&key("alvalade")).unwrap().label, "ALVALADE");
        assert_eq!(index.stats().homonym_parishes, 0);
    }
}
