//! Canonical lookup keys for administrative names.

use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercased, diacritic-free, whitespace-collapsed form of a name.
///
/// Only ever used as a map key; display always goes through the original label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    pub fn new(text: &str) -> Self {
        let stripped: String = text
            .nfkd()
            .filter(|c| !is_combining_mark(*c))
            .flat_map(char::to_lowercase)
            .collect();

        Self(stripped.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    /// Normalize, returning `None` when nothing is left.
    pub fn non_empty(text: &str) -> Option<Self> {
        let key = Self::new(text);
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NormalizedKey {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}
