//! Submitted configuration documents.
//!
//! A document maps configuration names to their TTL and path rules:
//!
//! ```yaml
//! starships:
//!   ttl: 10m
//!   paths:
//!     /ships/:class/:designation:
//!       GET:
//!         statusCode: 200
//!         bodyTemplate: "The {{designation}} is {{class}} class."
//!         responseHeaders:
//!           - Content-Type: text/plain
//!         delay: 250ms
//! ```
//!
//! YAML is a superset of JSON, so the same decoder accepts both formats.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration name → configuration.
pub type ConfigurationSet = BTreeMap<String, ConfigurationDocument>;

/// Path pattern → method → response.
pub type PathRules = BTreeMap<String, BTreeMap<String, ResponseDocument>>;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ConfigurationDocument {
    /// Lifetime of the whole configuration; absent or empty means forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(default)]
    pub paths: PathRules,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_template: Option<String>,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_headers: Vec<HeaderEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<String>,
}

/// One `{name: value}` item of `responseHeaders`.
///
/// Pairs keep their document order so repeated headers are appended in the
/// order they were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderEntry(pub Vec<(String, String)>);

impl HeaderEntry {
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self(vec![(name.into(), value.into())])
    }
}

/// Header values may be written as bare YAML scalars (`X-Retries: 3`).
#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Text(s) => f.write_str(s),
            ScalarValue::Integer(i) => write!(f, "{i}"),
            ScalarValue::Float(v) => write!(f, "{v}"),
            ScalarValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

struct HeaderEntryVisitor;

impl<'de> Visitor<'de> for HeaderEntryVisitor {
    type Value = HeaderEntry;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of header names to values")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(1));
        while let Some((name, value)) = map.next_entry::<String, ScalarValue>()? {
            pairs.push((name, value.to_string()));
        }
        Ok(HeaderEntry(pairs))
    }
}

impl<'de> Deserialize<'de> for HeaderEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(HeaderEntryVisitor)
    }
}

impl Serialize for HeaderEntry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration document: {0}")]
    Decode(#[from] serde_yaml::Error),
    #[error("configuration document declares no configurations")]
    Empty,
}

/// Decode a JSON or YAML document.
pub fn from_slice(bytes: &[u8]) -> Result<ConfigurationSet, DocumentError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(DocumentError::Empty);
    }
    let set: ConfigurationSet = serde_yaml::from_slice(bytes)?;
    if set.is_empty() {
        return Err(DocumentError::Empty);
    }
    Ok(set)
}

/// Read and decode a document file.
pub fn from_file(path: impl AsRef<Path>) -> Result<ConfigurationSet, DocumentError> {
    let path = path.as_ref();
    let contents = std::fs::read(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    from_slice(&contents)
}
