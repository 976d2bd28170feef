//! Free-text location → administrative hierarchy.

use std::sync::Arc;
use tracing::trace;

use super::AdminIndex;
use crate::models::{NormalizedKey, ResolvedHierarchy};

/// Characters that separate location components in listing text
pub const LOCATION_DELIMITERS: &[char] = &[',', '-', '|', '/', ';', '(', ')'];

/// Split a location string into normalized candidate tokens, in text order.
pub fn candidate_keys(text: &str) -> Vec<NormalizedKey> {
    text.split(LOCATION_DELIMITERS)
        .filter_map(NormalizedKey::non_empty)
        .collect()
}

/// Resolves listing locations against a shared [`AdminIndex`].
///
/// Matching is exact on normalized tokens. Priority is fixed: a parish hit
/// beats a municipality hit, which beats a district hit; within a level the
/// earliest token wins. Tokens that match nothing (street names, building
/// names) are ignored.
#[derive(Clone)]
pub struct LocationResolver {
    index: Arc<AdminIndex>,
}

impl LocationResolver {
    pub fn new(index: Arc<AdminIndex>) -> Self {
        Self { index }
    }

    pub fn resolve(&self, text: &str) -> ResolvedHierarchy {
        let mut resolved = ResolvedHierarchy::default();
        let keys = candidate_keys(text);
        if keys.is_empty() {
            return resolved;
        }

        // Parish pass
        for (pos, key) in keys.iter().enumerate() {
            if self.index.parish(key).is_none() {
                continue;
            }
            // A parish name shared by several municipalities is disambiguated
            // by any other token naming one of them, and a shared municipality
            // name by a token naming the district.
            let parish = keys
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != pos)
                .find_map(|(_, municipality)| {
                    let candidates = self.index.parishes_in_municipality(municipality, key);
                    candidates
                        .iter()
                        .find(|p| keys.contains(&NormalizedKey::new(&p.district)))
                        .or_else(|| candidates.first())
                })
                .or_else(|| self.index.parish(key));

            if let Some(parish) = parish {
                resolved.parish = Some(parish.label.clone());
                resolved.municipality = Some(parish.municipality.clone());
                resolved.district = Some(parish.district.clone());
                break;
            }
        }

        if resolved.municipality.is_none() {
            if let Some(municipality) = keys.iter().find_map(|k| self.index.municipality(k)) {
                resolved.municipality = Some(municipality.label.clone());
                resolved.district = Some(municipality.district.clone());
            }
        }

        if resolved.district.is_none() {
            if let Some(district) = keys.iter().find_map(|k| self.index.district(k)) {
                resolved.district = Some(district.label.clone());
            }
        }

        trace!("Resolved '{}' to {:?}", text, resolved);
        resolved
    }

    /// Resolve an optional location; missing text resolves to nothing.
    pub fn resolve_opt(&self, text: Option<&str>) -> ResolvedHierarchy {
        text.map(|t| self.resolve(t)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdminAreaRecord;

    fn resolver(records: &[AdminAreaRecord]) -> LocationResolver {
        LocationResolver::new(Arc::new(AdminIndex::build(records)))
    }

    fn lisbon_porto() -> LocationResolver {
        resolver(&[
            AdminAreaRecord::district("Lisboa"),
            AdminAreaRecord::district("Porto"),
            AdminAreaRecord::municipality("Lisboa", "Lisboa"),
            AdminAreaRecord::municipality("Matosinhos", "Porto"),
            AdminAreaRecord::municipality("Porto", "Porto"),
            AdminAreaRecord::parish("Alvalade", "Lisboa", "Lisboa"),
            AdminAreaRecord::parish("Cedofeita", "Porto", "Porto"),
        ])
    }

    fn hierarchy(d: Option<&str>, m: Option<&str>, p: Option<&str>) -> ResolvedHierarchy {
        ResolvedHierarchy {
            district: d.map(String::from),
            municipality: m.map(String::from),
            parish: p.map(String::from),
        }
    }

    #[test]
    fn test_candidate_keys_split_and_normalize() {
        let keys: Vec<String> = candidate_keys(" Alvalade , LISBOA | (Rua X) ;; / Évora-")
            .into_iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["alvalade", "lisboa", "rua x", "evora"]);
        assert!(candidate_keys(" , ; - ").is_empty());
    }

    #[test]
    fn test_parish_and_municipality() {
        let resolved = lisbon_porto().resolve("Alvalade, Lisboa");
        assert_eq!(resolved, hierarchy(Some("Lisboa"), Some("Lisboa"), Some("Alvalade")));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = lisbon_porto();
        assert_eq!(resolver.resolve("Alvalade, Lisboa"), resolver.resolve("Alvalade, Lisboa"));
    }

    #[test]
    fn test_municipality_without_parish() {
        let resolver = resolver(&[
            AdminAreaRecord::district("Porto"),
            AdminAreaRecord::municipality("Matosinhos", "Porto"),
        ]);
        let resolved = resolver.resolve("Matosinhos, Porto");
        assert_eq!(resolved, hierarchy(Some("Porto"), Some("Matosinhos"), None));
    }

    #[test]
    fn test_unmatched_text_resolves_to_nothing() {
        let resolved = lisbon_porto().resolve("Rua das Flores 12");
        assert!(resolved.is_unresolved());
        assert!(resolver(&[]).resolve("Alvalade, Lisboa").is_unresolved());
    }

    #[test]
    fn test_empty_input() {
        assert!(lisbon_porto().resolve("").is_unresolved());
        assert!(lisbon_porto().resolve(" ,, ( ) ").is_unresolved());
        assert!(lisbon_porto().resolve_opt(None).is_unresolved());
    }

    #[test]
    fn test_noise_tokens_are_ignored() {
        let resolved = lisbon_porto().resolve("Edifício Atlântico - Rua do Sol 3 - Cedofeita / Porto");
        assert_eq!(resolved, hierarchy(Some("Porto"), Some("Porto"), Some("Cedofeita")));
    }

    #[test]
    fn test_parish_outranks_earlier_municipality() {
        // Specificity before position
        let resolved = lisbon_porto().resolve("Porto, Alvalade");
        assert_eq!(resolved, hierarchy(Some("Lisboa"), Some("Lisboa"), Some("Alvalade")));
    }

    #[test]
    fn test_first_token_wins_within_level() {
        let resolved = lisbon_porto().resolve("Matosinhos, Lisboa");
        assert_eq!(resolved.municipality.as_deref(), Some("Matosinhos"));
        assert_eq!(resolved.district.as_deref(), Some("Porto"));

        let resolved = lisbon_porto().resolve("Cedofeita, Alvalade");
        assert_eq!(resolved.parish.as_deref(), Some("Cedofeita"));
    }

    #[test]
    fn test_district_only() {
        let resolved = lisbon_porto().resolve("Centro, porto ");
        // "porto" is also a municipality, so it resolves that level too
        assert_eq!(resolved, hierarchy(Some("Porto"), Some("Porto"), None));

        let resolver = resolver(&[AdminAreaRecord::district("Faro")]);
        assert_eq!(resolver.resolve("Algarve / FARO"), hierarchy(Some("Faro"), None, None));
    }

    #[test]
    fn test_partial_names_never_match() {
        let resolved = lisbon_porto().resolve("Alvalad, Matosinho");
        assert!(resolved.is_unresolved());
    }

    #[test]
    fn test_homonym_parish_uses_context() {
        let resolver = resolver(&[
            AdminAreaRecord::parish("Santa Maria", "Lagos", "Faro"),
            AdminAreaRecord::parish("Santa Maria", "Bragança", "Bragança"),
        ]);

        let resolved = resolver.resolve("Santa Maria, Lagos");
        assert_eq!(resolved, hierarchy(Some("Faro"), Some("Lagos"), Some("Santa Maria")));

        // Without context the primary (last seen) entry is used
        let resolved = resolver.resolve("Santa Maria");
        assert_eq!(resolved.municipality.as_deref(), Some("Bragança"));
    }

    #[test]
    fn test_shared_municipality_name_uses_district_token() {
        let resolver = resolver(&[
            AdminAreaRecord::district("Faro"),
            AdminAreaRecord::district("Ponta Delgada"),
            AdminAreaRecord::municipality("Lagoa", "Faro"),
            AdminAreaRecord::municipality("Lagoa", "Ponta Delgada"),
            AdminAreaRecord::parish("Ferragudo", "Lagoa", "Faro"),
            AdminAreaRecord::parish("Rosário", "Lagoa", "Faro"),
            AdminAreaRecord::parish("Rosário", "Lagoa", "Ponta Delgada"),
        ]);

        let resolved = resolver.resolve("Ferragudo, Lagoa");
        assert_eq!(resolved, hierarchy(Some("Faro"), Some("Lagoa"), Some("Ferragudo")));

        let resolved = resolver.resolve("Rosário, Lagoa, Faro");
        assert_eq!(resolved, hierarchy(Some("Faro"), Some("Lagoa"), Some("Rosário")));

        let resolved = resolver.resolve("Rosário - Lagoa - Ponta Delgada");
        assert_eq!(resolved, hierarchy(Some("Ponta Delgada"), Some("Lagoa"), Some("Rosário")));
    }
}
