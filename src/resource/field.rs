//! Attribute mapping descriptors
//!
//! Body fields are the serde fields of a resource type. The descriptors here
//! cover what serde cannot see: attributes carried in HTTP headers, attributes
//! substituted into the URL path, and list filters with their wire names.

use crate::error::{Error, Result};
use reqwest::header::HeaderMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// How a header value becomes an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Str,
    Int,
    Bool,
}

/// An attribute that travels in an HTTP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderField {
    pub attr: &'static str,
    pub header: &'static str,
    pub coerce: Coercion,
    /// Reported by the server but never sent
    pub read_only: bool,
}

impl HeaderField {
    pub const fn string(attr: &'static str, header: &'static str) -> Self {
        Self {
            attr,
            header,
            coerce: Coercion::Str,
            read_only: false,
        }
    }

    pub const fn int(attr: &'static str, header: &'static str) -> Self {
        Self {
            attr,
            header,
            coerce: Coercion::Int,
            read_only: false,
        }
    }

    pub const fn boolean(attr: &'static str, header: &'static str) -> Self {
        Self {
            attr,
            header,
            coerce: Coercion::Bool,
            read_only: false,
        }
    }

    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Read this field from response headers
    pub fn read(&self, headers: &HeaderMap) -> Option<Value> {
        let raw = headers.get(self.header)?.to_str().ok()?;
        Some(coerce(raw, self.coerce))
    }
}

/// Convert a raw header string; values that do not parse stay strings
pub fn coerce(raw: &str, coercion: Coercion) -> Value {
    match coercion {
        Coercion::Str => Value::String(raw.to_string()),
        Coercion::Int => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        Coercion::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Value::Bool(true),
            "false" | "0" | "no" | "off" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
    }
}

/// Render an attribute value for use as a header; `null` means "omit"
pub fn header_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Collect every `<prefix><key>` header into a `key -> value` map
pub fn read_metadata(headers: &HeaderMap, prefix: &str) -> Map<String, Value> {
    let prefix = prefix.to_ascii_lowercase();
    headers
        .iter()
        .filter_map(|(name, value)| {
            let key = name.as_str().strip_prefix(prefix.as_str())?;
            let value = value.to_str().ok()?;
            Some((key.to_string(), Value::String(value.to_string())))
        })
        .collect()
}

/// Values for the `{placeholders}` of a base path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriParams(BTreeMap<String, String>);

impl UriParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UriParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Substitute every `{name}` in `template` with its percent-encoded value
pub fn render_path(template: &str, params: &UriParams, kind: &str) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let name = &rest[start + 1..start + len];
        let value = params.get(name).ok_or_else(|| {
            Error::InvalidRequest(format!("{} requires URI parameter '{}'", kind, name))
        })?;
        out.push_str(&rest[..start]);
        out.push_str(&urlencoding::encode(value));
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Names of the `{placeholders}` in a base path
pub fn path_params(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        names.push(&rest[start + 1..start + len]);
        rest = &rest[start + len + 1..];
    }
    names
}

/// List filters, keyed by client-side name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(BTreeMap<String, String>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn limit(self, limit: usize) -> Self {
        self.filter("limit", limit)
    }

    pub fn marker(self, marker: impl ToString) -> Self {
        self.filter("marker", marker)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The filters a resource accepts, mapping client names to wire names
///
/// `limit` and `marker` are always accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameters {
    mapping: BTreeMap<&'static str, &'static str>,
}

impl Default for QueryParameters {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl QueryParameters {
    pub fn new(names: &[&'static str]) -> Self {
        let mapping = ["limit", "marker"]
            .iter()
            .chain(names.iter())
            .map(|name| (*name, *name))
            .collect();
        Self { mapping }
    }

    /// Accept `client` and send it as `wire`
    pub fn with_mapping(mut self, client: &'static str, wire: &'static str) -> Self {
        self.mapping.insert(client, wire);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.mapping.contains_key(name)
    }

    /// Translate client names into wire names, rejecting unknown filters
    pub fn transpose(&self, query: &Query, kind: &str) -> Result<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        let mut invalid = Vec::new();

        for (key, value) in query.iter() {
            if let Some(wire) = self.mapping.get(key) {
                out.insert(wire.to_string(), value.to_string());
            } else if self.mapping.values().any(|wire| *wire == key) {
                out.insert(key.to_string(), value.to_string());
            } else {
                invalid.push(key);
            }
        }

        if !invalid.is_empty() {
            return Err(Error::InvalidResourceQuery(format!(
                "invalid query params for {}: {}",
                kind,
                invalid.join(",")
            )));
        }

        Ok(out)
    }
}
