//! Handshake header configuration.
//!
//! [`HeaderConfig`] is an ordered header name → value mapping. Names are
//! unique under ASCII case-insensitive comparison; inserting an existing name
//! replaces its value in place, so iteration order always follows the first
//! insertion of each name.
//!
//! # Example
//!
//! ```
//! use ws_connector::HeaderConfig;
//!
//! # fn example() -> ws_connector::Result<()> {
//! let mut headers = HeaderConfig::new();
//! headers.insert("Authorization", "Bearer token1")?;
//! headers.insert("X-Client", "demo")?;
//! headers.insert("authorization", "Bearer token2")?;
//!
//! assert_eq!(headers.len(), 2);
//! assert_eq!(headers.get("Authorization"), Some("Bearer token2"));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::result::Result as StdResult;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};

use crate::error::{Error, Result};

// ============================================================================
// HeaderConfig
// ============================================================================

/// Ordered, validated handshake headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderConfig {
    /// Entries in first-insertion order.
    entries: Vec<(String, String)>,
}

// ============================================================================
// Constructors
// ============================================================================

impl HeaderConfig {
    /// Creates an empty configuration.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Builds a configuration from name/value pairs.
    ///
    /// Later pairs overwrite earlier ones with the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] on the first invalid pair.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Result<Self>
    where
        N: Into<String>,
        V: Into<String>,
    {
        let mut config = Self::new();
        for (name, value) in pairs {
            config.insert(name, value)?;
        }
        Ok(config)
    }

    /// Parses a JSON object of string values, keeping document order.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the input is not an object of strings
    /// - [`Error::Json`] wrapping the validation message for a bad header
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the configuration as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl HeaderConfig {
    /// Inserts or replaces a header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the name is empty or is not a
    /// valid HTTP header name, or if the value contains forbidden bytes.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        validate(&name, &value)?;

        match self.position(&name) {
            Some(index) => self.entries[index] = (name, value),
            None => self.entries.push((name, value)),
        }
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    ///
    /// # Errors
    ///
    /// Same as [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// Returns the value stored for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|index| self.entries[index].1.as_str())
    }

    /// Removes a header, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name)
            .map(|index| self.entries.remove(index).1)
    }

    /// Returns the number of headers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no headers are configured.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Iterates over header names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Validates a header pair against HTTP rules.
fn validate(name: &str, value: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_argument("Header name must not be empty"));
    }

    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| Error::invalid_argument(format!("Invalid header name: {name:?}")))?;

    HeaderValue::from_str(value).map_err(|_| {
        Error::invalid_argument(format!("Invalid value for header {name:?}"))
    })?;

    Ok(())
}

// ============================================================================
// Serde
// ============================================================================

impl Serialize for HeaderConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> StdResult<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HeaderConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> StdResult<Self, D::Error> {
        deserializer.deserialize_map(HeaderConfigVisitor)
    }
}

struct HeaderConfigVisitor;

impl<'de> Visitor<'de> for HeaderConfigVisitor {
    type Value = HeaderConfig;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map of header names to string values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> StdResult<Self::Value, A::Error> {
        let mut config = HeaderConfig::new();
        while let Some((name, value)) = access.next_entry::<String, String>()? {
            config
                .insert(name, value)
                .map_err(serde::de::Error::custom)?;
        }
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_insert_and_get() {
        let mut headers = HeaderConfig::new();
        headers.insert("Auth", "token1").expect("valid header");
        assert_eq!(headers.get("Auth"), Some("token1"));
        assert_eq!(headers.get("auth"), Some("token1"));
        assert_eq!(headers.get("Missing"), None);
    }

    #[test]
    fn test_last_write_wins_keeps_position() {
        let headers = HeaderConfig::from_pairs([("A", "1"), ("B", "2"), ("a", "3")])
            .expect("valid headers");

        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("B", "2")]);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut headers = HeaderConfig::new();
        let err = headers.insert("", "value").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_invalid_name_rejected() {
        let err = HeaderConfig::new().with("Bad Name", "v").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_invalid_value_rejected() {
        let err = HeaderConfig::new().with("X-Test", "line\nbreak").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_remove() {
        let mut headers = HeaderConfig::from_pairs([("A", "1"), ("B", "2")]).unwrap();
        assert_eq!(headers.remove("a"), Some("1".to_string()));
        assert_eq!(headers.remove("a"), None);
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn test_from_json_preserves_order() {
        let headers = HeaderConfig::from_json(r#"{"Zeta": "1", "Alpha": "2"}"#).unwrap();
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["Zeta", "Alpha"]);
        assert_eq!(headers.to_json().unwrap(), r#"{"Zeta":"1","Alpha":"2"}"#);
    }

    #[test]
    fn test_from_json_rejects_empty_name() {
        let err = HeaderConfig::from_json(r#"{"": "1"}"#).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_from_json_rejects_non_string_value() {
        assert!(HeaderConfig::from_json(r#"{"Retry": 3}"#).is_err());
    }

    proptest! {
        #[test]
        fn prop_names_stay_unique(
            pairs in proptest::collection::vec(("[A-Ca-c]{1,2}", "[a-z0-9]{0,4}"), 0..24)
        ) {
            let headers = HeaderConfig::from_pairs(pairs.clone()).unwrap();

            let mut seen: Vec<String> = Vec::new();
            for name in headers.names() {
                let lower = name.to_ascii_lowercase();
                prop_assert!(!seen.contains(&lower));
                seen.push(lower);
            }

            for (name, _) in &pairs {
                let last = pairs
                    .iter()
                    .rev()
                    .find(|(n, _)| n.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v.as_str());
                prop_assert_eq!(headers.get(name), last);
            }
        }
    }
}
