//! Request and response envelopes.
//!
//! An envelope is the structured record exchanged as one logical request or
//! response. The correlation id (`id`) is the only link between a response and
//! the request that produced it.

use std::collections::HashMap;
use std::fmt;

use axum::http::HeaderMap;
use bytes::Bytes;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::codec::json::raw_body;

/// Inbound request record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    /// Correlation id, unique per in-flight request on one connection.
    #[serde(default)]
    pub id: String,

    /// HTTP method name.
    #[serde(default)]
    pub method: String,

    /// Absolute or server-relative request target.
    #[serde(default)]
    pub request_uri: String,

    /// Request headers.
    #[serde(default)]
    pub header: HeaderMultimap,

    /// Request body.
    #[serde(default, with = "raw_body")]
    pub body: Bytes,
}

/// Outbound response record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// Correlation id copied from the originating request.
    #[serde(default)]
    pub id: String,

    /// HTTP status code set by the handler.
    #[serde(default)]
    pub status_code: u16,

    /// Request target echoed back for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_uri: Option<String>,

    /// Response headers.
    #[serde(default)]
    pub header: HeaderMultimap,

    /// Response body.
    #[serde(default, with = "raw_body")]
    pub body: Bytes,
}

/// Ordered `name -> [values]` map that keeps duplicate values per name.
///
/// Names keep their first-seen order and are matched exactly (no case folding).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMultimap {
    entries: Vec<(String, Vec<String>)>,
    /// Name to position in `entries`.
    index: HashMap<String, usize>,
}

impl HeaderMultimap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `name`, keeping any values already present.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.index.get(&name) {
            Some(&slot) => self.entries[slot].1.push(value),
            None => self.push_entry(name, vec![value]),
        }
    }

    fn push_entry(&mut self, name: String, values: Vec<String>) {
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, values));
    }

    /// All values stored under `name`.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.index
            .get(name)
            .map(|&slot| self.entries[slot].1.as_slice())
    }

    /// Iterate over `(name, values)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot an `http` header map. Names are written in canonical form
    /// (`content-type` becomes `Content-Type`); non-UTF-8 values are converted
    /// lossily.
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let mut map = Self::new();
        for name in headers.keys() {
            let values = headers
                .get_all(name)
                .iter()
                .map(|value| match value.to_str() {
                    Ok(text) => text.to_owned(),
                    Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
                })
                .collect();
            map.push_entry(canonical_name(name.as_str()), values);
        }
        map
    }
}

/// Capitalize the first letter and every letter after a `-`, lowercase the
/// rest.
fn canonical_name(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMultimap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.append(name, value);
        }
        map
    }
}

impl Serialize for HeaderMultimap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, values) in &self.entries {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HeaderMultimap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_option(OptionalMultimapVisitor)
    }
}

struct OptionalMultimapVisitor;

impl<'de> Visitor<'de> for OptionalMultimapVisitor {
    type Value = HeaderMultimap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of header names to lists of values, or null")
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(HeaderMultimap::new())
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(HeaderMultimap::new())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(MultimapVisitor)
    }
}

struct MultimapVisitor;

impl<'de> Visitor<'de> for MultimapVisitor {
    type Value = HeaderMultimap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of header names to lists of values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = HeaderMultimap::new();
        // Repeated names merge rather than overwrite.
        while let Some((name, values)) = access.next_entry::<String, Option<Vec<String>>>()? {
            for value in values.unwrap_or_default() {
                map.append(name.clone(), value);
            }
        }
        Ok(map)
    }
}
