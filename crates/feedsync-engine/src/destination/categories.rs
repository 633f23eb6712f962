//! Category resolution
//!
//! Maps free-text feed categories onto destination category ids. Lookup is
//! case-insensitive first, then retried with punctuation stripped, and falls
//! back to the configured default id so resolution always succeeds.

use std::collections::HashMap;
use tracing::debug;

pub struct CategoryResolver {
    by_name: HashMap<String, i64>,
    normalized: HashMap<String, i64>,
    default_id: i64,
}

impl CategoryResolver {
    pub fn new(category_map: &HashMap<String, i64>, default_id: i64) -> Self {
        let mut by_name = HashMap::new();
        let mut normalized = HashMap::new();
        for (name, &id) in category_map {
            by_name.insert(name.to_lowercase(), id);
            normalized.insert(normalize_name(name), id);
        }
        Self { by_name, normalized, default_id }
    }

    pub fn resolve(&self, category: &str) -> i64 {
        let lowered = category.trim().to_lowercase();
        if let Some(&id) = self.by_name.get(&lowered) {
            return id;
        }
        if let Some(&id) = self.normalized.get(&normalize_name(category)) {
            return id;
        }
        debug!(category, default_id = self.default_id, "category not mapped, using default");
        self.default_id
    }
}

/// Lowercase with everything non-alphanumeric removed, so "Tools & Parts"
/// and "tools-parts" land on the same key.
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn resolver() -> CategoryResolver {
        let mut map = HashMap::new();
        map.insert("Tools & Parts".to_string(), 10);
        map.insert("Shoes".to_string(), 20);
        CategoryResolver::new(&map, 99)
    }

    #[test]
    fn test_resolve_case_insensitive() {
        assert_eq!(resolver().resolve("shoes"), 20);
        assert_eq!(resolver().resolve("SHOES"), 20);
        assert_eq!(resolver().resolve("  Shoes  "), 20);
    }

    #[test]
    fn test_resolve_punctuation_normalized() {
        assert_eq!(resolver().resolve("tools-parts"), 10);
        assert_eq!(resolver().resolve("Tools&Parts"), 10);
        assert_eq!(resolver().resolve("tools  parts"), 10);
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        assert_eq!(resolver().resolve("Gardening"), 99);
        assert_eq!(resolver().resolve(""), 99);
    }
}
