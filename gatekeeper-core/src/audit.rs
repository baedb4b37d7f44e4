//! The `AuditEvent` data model (§3, §4.6).
//!
//! One event is emitted per successful mutating (POST/PUT/DELETE) forward.
//! Construction never fails; best-effort derivation from the URL and body
//! matches the "audit errors are logged and swallowed, never surfaced"
//! failure mode — there is no `Result` in this module because every path
//! already degrades to `None` fields instead of erroring.

use serde::Serialize;
use serde_json::Value;

pub const EVENT_VERSION: &str = "1";

/// A single structured audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub message: String,
    pub event_version: &'static str,
    /// `[resourceType, method]`, matching the shipped tag shape.
    pub tags: [String; 2],
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub timestamp: String,
}

/// Best-effort `(resourceType, id)` derivation from a `/fhir/{Type}/{id}`
/// style path when both are not already known, mirroring the original's
/// `deets_from_url`.
pub fn resource_details_from_path(path: &str, resource_type: Option<String>, id: Option<String>) -> (Option<String>, Option<String>) {
    if resource_type.is_some() && id.is_some() {
        return (resource_type, id);
    }

    let items: Vec<&str> = path.split('/').collect();
    if items.len() < 3 {
        return (resource_type, id);
    }
    let rt = resource_type.or_else(|| Some(items[2].to_string()));
    let resolved_id = id.or_else(|| items.get(3).map(|s| s.to_string()));
    (rt, resolved_id)
}

/// Build an [`AuditEvent`] for a mutating request, deriving `resourceType`
/// and `id` from `resource` (if supplied) or else from `path`, and
/// `subject` when the resource is a `Patient` with a known id.
pub struct AuditEventBuilder<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub user: Option<String>,
    pub resource: Option<&'a Value>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub params: Option<Value>,
    pub timestamp: String,
}

impl<'a> AuditEventBuilder<'a> {
    pub fn build(self) -> AuditEvent {
        let rt_from_body = self.resource_type.or_else(|| {
            self.resource.and_then(|r| r.get("resourceType")).and_then(Value::as_str).map(String::from)
        });
        let id_from_body = self.resource_id.or_else(|| {
            self.resource.and_then(|r| r.get("id")).and_then(Value::as_str).map(String::from)
        });

        let (rt, id) = resource_details_from_path(self.path, rt_from_body, id_from_body);
        let rt_display = rt.clone().unwrap_or_else(|| "unknown".to_string());

        let message = match &id {
            Some(id) => format!("{} {}/{}", self.method, rt_display, id),
            None => format!("{} {}", self.method, rt_display),
        };

        let subject = if rt.as_deref() == Some("Patient") {
            id.as_ref().map(|id| format!("Patient/{id}"))
        } else {
            None
        };

        let resource = if subject.is_none() { self.resource.cloned() } else { None };

        AuditEvent {
            message,
            event_version: EVENT_VERSION,
            tags: [rt_display, self.method.to_string()],
            user: self.user,
            subject,
            resource,
            params: self.params,
            timestamp: self.timestamp,
        }
    }
}
