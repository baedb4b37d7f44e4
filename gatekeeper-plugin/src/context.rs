//! `RequestContext` — the per-request view handed to every policy module.
//!
//! Headers are case-insensitive and query parameters are an
//! order-preserving multi-map, matching the Data Model contract. The
//! parsed body is lazy: it is only populated when the coordinator
//! detects a JSON-family media type (§6 constants).

use serde_json::Value;

/// FHIR media types accepted as JSON, beyond the literal `application/json`.
pub fn is_json_media_type(content_type: &str) -> bool {
    let ct = content_type.split(';').next().unwrap_or("").trim().to_lowercase();
    ct == "application/json"
        || ct.starts_with("application/") && ct.ends_with("+json")
        || ct.contains("json+fhir")
        || ct.ends_with("+fhir")
}

#[derive(Debug, Clone)]
pub struct HeaderMap(Vec<(String, String)>);

impl HeaderMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let lower = name.to_ascii_lowercase();
        self.0.iter().find(|(k, _)| k.to_ascii_lowercase() == lower).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for HeaderMap {
    fn default() -> Self {
        Self::new()
    }
}

/// The request data a policy module is allowed to observe.
///
/// Created once per inbound HTTP request by the Pipeline Coordinator and
/// destroyed after the response is returned — never shared across
/// requests, never mutated by a module (modules receive `&RequestContext`).
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub raw_body: Vec<u8>,
    /// Lazily-parsed body; `None` when the body is empty or the content
    /// type is not JSON-family.
    pub parsed_body: Option<Value>,
    pub is_json: bool,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>, query: Vec<(String, String)>, headers: HeaderMap, raw_body: Vec<u8>) -> Self {
        let content_type = headers.get("content-type").unwrap_or("").to_string();
        let is_json = is_json_media_type(&content_type);
        let parsed_body = if is_json && !raw_body.is_empty() {
            serde_json::from_slice(&raw_body).ok()
        } else {
            None
        };

        Self {
            method: method.into(),
            path: path.into(),
            query,
            headers,
            raw_body,
            parsed_body,
            is_json,
        }
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// `true` when the path starts with `prefix`.
    pub fn path_starts_with(&self, prefix: &str) -> bool {
        self.path.starts_with(prefix)
    }

    /// `true` when `/.well-known` appears as a path segment (either the
    /// leading segment or nested, e.g. `/fhir/.well-known/...`).
    pub fn path_has_well_known_segment(&self) -> bool {
        self.path.starts_with("/.well-known") || self.path.contains("/.well-known/")
    }
}
