//! Opaque credential payload
//!
//! A string-keyed map produced by the external login layer (cookies, tokens,
//! account metadata). This layer never interprets the contents beyond the
//! identity-extraction hook callers supply to the pool. Values are redacted
//! in Debug output and zeroized on drop.

use std::collections::HashMap;
use std::fmt;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use zeroize::Zeroize;

/// Opaque string-keyed credential material.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Payload {
    entries: HashMap<String, String>,
}

impl Payload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing map (e.g. parsed from a seed file).
    pub fn from_map(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Look up an entry by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Iterate over keys (values stay behind `get`).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds a payload from key/value pairs.
impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        for key in keys {
            map.entry(&key, &"[REDACTED]");
        }
        map.finish()
    }
}

impl Drop for Payload {
    fn drop(&mut self) {
        for value in self.entries.values_mut() {
            value.zeroize();
        }
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter())
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_map(HashMap::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut payload = Payload::new();
        payload.insert("cookie", "session=abc123");
        payload.insert("uid", "42");

        assert_eq!(payload.get("cookie"), Some("session=abc123"));
        assert_eq!(payload.get("uid"), Some("42"));
        assert_eq!(payload.get("missing"), None);
        assert_eq!(payload.len(), 2);
        assert!(!payload.is_empty());
    }

    #[test]
    fn debug_redacts_values() {
        let payload: Payload = [("cookie", "session=topsecret")].into_iter().collect();
        let debug = format!("{payload:?}");
        assert!(debug.contains("cookie"), "keys stay visible, got: {debug}");
        assert!(debug.contains("[REDACTED]"));
        assert!(
            !debug.contains("topsecret"),
            "value must not leak, got: {debug}"
        );
    }

    #[test]
    fn serde_roundtrip() {
        let payload: Payload = [("uid", "42"), ("token", "t-1")].into_iter().collect();
        let json = serde_json::to_string(&payload).unwrap();
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
