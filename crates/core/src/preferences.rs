use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque configuration values handed to every rule evaluation.
///
/// An empty set is the "default values" provider: rules fall back to their
/// own defaults through the `*_or` getters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    values: HashMap<String, String>,
}

impl Preferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Parse a value, falling back to `default` when missing or unparsable.
    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Preferences {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut prefs = Preferences::new();
        for (k, v) in iter {
            prefs.set(k, v);
        }
        prefs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup_with_fallback() {
        let prefs = Preferences::new()
            .with("gc.pause.warning_ms", "250")
            .with("mode", "strict");
        assert_eq!(prefs.parse_or("gc.pause.warning_ms", 100u64), 250);
        assert_eq!(prefs.parse_or("mode", 7u32), 7);
        assert_eq!(prefs.parse_or("missing", 1.5f64), 1.5);
        assert_eq!(prefs.get_or("mode", "lenient"), "strict");
        assert_eq!(prefs.get_or("other", "lenient"), "lenient");
    }

    #[test]
    fn collect_from_pairs() {
        let prefs: Preferences = vec![("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(prefs.len(), 2);
        assert_eq!(prefs.get("b"), Some("2"));
    }
}
