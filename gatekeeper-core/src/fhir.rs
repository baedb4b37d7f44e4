//! FHIR resource/Bundle semantics shared by the built-in policy modules.
//!
//! Detection is purely structural: an object is a "FHIR resource" iff it
//! carries a `resourceType` field (§3 invariant). Security labels are a
//! coded entry in `meta.security[]`; the configured system URI is the
//! ownership marker keyed by the user's `sub`.

use serde_json::{Map, Value};

/// A single `meta.security[]` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityLabel {
    pub system: String,
    pub code: String,
    pub display: Option<String>,
}

impl SecurityLabel {
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("system".to_string(), Value::String(self.system.clone()));
        map.insert("code".to_string(), Value::String(self.code.clone()));
        if let Some(d) = &self.display {
            map.insert("display".to_string(), Value::String(d.clone()));
        }
        Value::Object(map)
    }

    pub fn from_value(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        Some(Self {
            system: obj.get("system")?.as_str()?.to_string(),
            code: obj.get("code")?.as_str()?.to_string(),
            display: obj.get("display").and_then(Value::as_str).map(String::from),
        })
    }
}

/// `true` iff `value` is a JSON object carrying a `resourceType` field.
pub fn is_fhir_resource(value: &Value) -> bool {
    value.as_object().map(|o| o.contains_key("resourceType")).unwrap_or(false)
}

pub fn resource_type(value: &Value) -> Option<&str> {
    value.get("resourceType").and_then(Value::as_str)
}

pub fn is_bundle(value: &Value) -> bool {
    resource_type(value) == Some("Bundle")
}

pub fn bundle_type(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}

/// Security labels carried by a resource's `meta.security[]`, in order.
pub fn security_labels(resource: &Value) -> Vec<SecurityLabel> {
    resource
        .get("meta")
        .and_then(|m| m.get("security"))
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(SecurityLabel::from_value).collect())
        .unwrap_or_default()
}

/// `true` iff `resource` carries a security label in `system` whose code
/// equals `code`.
pub fn has_security_label(resource: &Value, system: &str, code: &str) -> bool {
    security_labels(resource).iter().any(|l| l.system == system && l.code == code)
}

/// `true` iff `resource`'s `code.coding[]` contains an entry whose
/// `system` matches the absent-unknown coding system — i.e. the element
/// is explicitly marked as known-absent rather than withheld.
pub fn has_absent_unknown_coding(resource: &Value, absent_unknown_system: &str) -> bool {
    resource
        .get("code")
        .and_then(|c| c.get("coding"))
        .and_then(Value::as_array)
        .map(|codings| {
            codings.iter().any(|c| {
                c.get("system").and_then(Value::as_str) == Some(absent_unknown_system)
            })
        })
        .unwrap_or(false)
}

/// Remove any existing label in `system`, then append a fresh one keyed
/// by `code`, mutating `resource` in place. `resource` must be a JSON
/// object; non-objects are left untouched.
pub fn set_security_label(resource: &mut Value, system: &str, code: &str, display: impl Into<String>) {
    let Some(obj) = resource.as_object_mut() else { return };

    let meta = obj.entry("meta").or_insert_with(|| Value::Object(Map::new()));
    if !meta.is_object() {
        *meta = Value::Object(Map::new());
    }
    let meta_obj = meta.as_object_mut().unwrap();

    let security = meta_obj.entry("security").or_insert_with(|| Value::Array(Vec::new()));
    if !security.is_array() {
        *security = Value::Array(Vec::new());
    }
    let security_arr = security.as_array_mut().unwrap();

    security_arr.retain(|label| label.get("system").and_then(Value::as_str) != Some(system));

    let label = SecurityLabel {
        system: system.to_string(),
        code: code.to_string(),
        display: Some(display.into()),
    };
    security_arr.push(label.to_value());
}

/// Entries of a Bundle, as a mutable slice view. Returns `None` if
/// `value` is not a Bundle or `entry` is not an array.
pub fn bundle_entries(value: &Value) -> Option<&Vec<Value>> {
    if !is_bundle(value) {
        return None;
    }
    value.get("entry").and_then(Value::as_array)
}

/// Replace a Bundle's `entry[]` with `entries`, updating `total` (when
/// present) to the new count and preserving every other field including
/// `type`.
pub fn replace_bundle_entries(bundle: &mut Value, entries: Vec<Value>) {
    let Some(obj) = bundle.as_object_mut() else { return };
    let count = entries.len() as u64;
    obj.insert("entry".to_string(), Value::Array(entries));
    if obj.contains_key("total") {
        obj.insert("total".to_string(), Value::from(count));
    }
}

/// HTTP method of a transaction-Bundle entry (`entry.request.method`),
/// uppercased.
pub fn entry_request_method(entry: &Value) -> Option<String> {
    entry
        .get("request")
        .and_then(|r| r.get("method"))
        .and_then(Value::as_str)
        .map(|s| s.to_uppercase())
}

pub fn entry_resource(entry: &Value) -> Option<&Value> {
    entry.get("resource")
}
