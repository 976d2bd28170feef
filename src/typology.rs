//! Typology labels ("T2", "T3+1") inferred from listing titles and bedroom counts.

use regex::Regex;
use std::sync::LazyLock;

pub const UNKNOWN_TYPOLOGY: &str = "Unknown";

static TYPOLOGY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[Tt](\d{1,2})(?:\+(\d{1,2}))?\b").expect("typology pattern is valid")
});

/// Derive the typology label of a listing.
///
/// A token in the title takes priority over the bedroom count, since titles
/// often carry the typology when the structured field is missing or wrong.
pub fn infer_typology(title: Option<&str>, bedrooms: Option<f64>) -> String {
    if let Some(label) = title.and_then(typology_from_title) {
        return label;
    }

    match bedrooms {
        Some(b) if b.is_finite() && b >= 0.0 => format!("T{}", b.round() as u64),
        _ => UNKNOWN_TYPOLOGY.to_string(),
    }
}

fn typology_from_title(title: &str) -> Option<String> {
    let caps = TYPOLOGY_TOKEN.captures(title)?;
    let base: u32 = caps.get(1)?.as_str().parse().ok()?;

    Some(match caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok()) {
        Some(extra) => format!("T{}+{}", base, extra),
        None => format!("T{}", base),
    })
}
