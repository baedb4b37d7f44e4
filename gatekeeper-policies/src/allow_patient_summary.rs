//! Relaxed filtering for the FHIR `Patient/{id}/$summary` and
//! `Patient/{id}/$everything` operations: in addition to the user's own
//! labeled resources, always admits `Composition` resources and
//! elements explicitly marked absent/unknown. Runs ahead of
//! `51_fhir_response_security` (lower discovery-name prefix) so its
//! relaxed bundle survives unchanged through the stricter pass.

use async_trait::async_trait;
use gatekeeper_core::fhir;
use gatekeeper_core::Claims;
use gatekeeper_plugin::{Capabilities, PolicyModule, RequestContext};
use serde_json::Value;

fn patient_operation_segment(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/fhir/Patient/")?;
    let (_id, op) = rest.split_once("/$")?;
    if op.contains('/') {
        return None;
    }
    Some(op)
}

fn is_patient_summary_request(path: &str) -> bool {
    matches!(patient_operation_segment(path), Some("summary") | Some("everything"))
}

fn is_composition(resource: &Value) -> bool {
    fhir::resource_type(resource) == Some("Composition")
}

fn is_allowed(resource: &Value, system: &str, sub: &str, absent_unknown_system: &str) -> bool {
    is_composition(resource) || fhir::has_security_label(resource, system, sub) || fhir::has_absent_unknown_coding(resource, absent_unknown_system)
}

pub struct AllowPatientSummary {
    system: String,
    absent_unknown_system: String,
}

impl AllowPatientSummary {
    pub fn new(system: impl Into<String>, absent_unknown_system: impl Into<String>) -> Self {
        Self { system: system.into(), absent_unknown_system: absent_unknown_system.into() }
    }
}

#[async_trait]
impl PolicyModule for AllowPatientSummary {
    fn name(&self) -> &str {
        "05_allow_patient_summary"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { transforms_response: true, ..Default::default() }
    }

    async fn transform_response(&self, ctx: &RequestContext, body: &Value, claims: Option<&Claims>) -> Option<Value> {
        if ctx.method != "GET" || !is_patient_summary_request(&ctx.path) || !fhir::is_bundle(body) {
            return None;
        }

        let Some(sub) = claims.and_then(Claims::sub) else {
            let mut out = body.clone();
            fhir::replace_bundle_entries(&mut out, Vec::new());
            return Some(out);
        };

        let entries = fhir::bundle_entries(body).cloned().unwrap_or_default();
        let original = entries.len();
        let filtered: Vec<Value> = entries
            .iter()
            .filter(|entry| {
                fhir::entry_resource(entry).is_some_and(|r| is_allowed(r, &self.system, sub, &self.absent_unknown_system))
            })
            .cloned()
            .collect();

        if filtered.len() < original {
            tracing::info!(dropped = original - filtered.len(), user = sub, "filtered resource(s) from patient operation bundle");
        }

        let mut out = body.clone();
        fhir::replace_bundle_entries(&mut out, filtered);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_plugin::context::HeaderMap;
    use serde_json::json;

    const SYS: &str = "http://keycloak.cirg.uw.edu/fhir/security-labels";
    const ABSENT: &str = "http://hl7.org/fhir/uv/ips/CodeSystem/absent-unknown-uv-ips";

    fn ctx(path: &str) -> RequestContext {
        RequestContext::new("GET", path, vec![], HeaderMap::new(), vec![])
    }

    fn claims(sub: &str) -> Claims {
        let mut m = serde_json::Map::new();
        m.insert("sub".to_string(), Value::String(sub.to_string()));
        Claims::from_map(m)
    }

    #[test]
    fn recognizes_summary_and_everything_operations() {
        assert!(is_patient_summary_request("/fhir/Patient/123/$summary"));
        assert!(is_patient_summary_request("/fhir/Patient/123/$everything"));
        assert!(!is_patient_summary_request("/fhir/Patient/123"));
        assert!(!is_patient_summary_request("/fhir/Patient/123/$summary/extra"));
    }

    #[tokio::test]
    async fn ignores_non_patient_operation_paths() {
        let out = AllowPatientSummary::new(SYS, ABSENT)
            .transform_response(&ctx("/fhir/Observation"), &json!({"resourceType": "Bundle", "entry": []}), None)
            .await;
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn admits_composition_and_absent_unknown_alongside_labeled() {
        let bundle = json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [
                {"resource": {"resourceType": "Composition"}},
                {"resource": {"resourceType": "Observation", "meta": {"security": [{"system": SYS, "code": "u1"}]}}},
                {"resource": {"resourceType": "AllergyIntolerance", "code": {"coding": [{"system": ABSENT}]}}},
                {"resource": {"resourceType": "Observation", "meta": {"security": [{"system": SYS, "code": "other"}]}}},
            ]
        });
        let out = AllowPatientSummary::new(SYS, ABSENT)
            .transform_response(&ctx("/fhir/Patient/1/$summary"), &bundle, Some(&claims("u1")))
            .await
            .unwrap();
        assert_eq!(out["entry"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn no_claims_empties_the_bundle() {
        let bundle = json!({"resourceType": "Bundle", "type": "searchset", "entry": [{"resource": {"resourceType": "Composition"}}]});
        let out = AllowPatientSummary::new(SYS, ABSENT)
            .transform_response(&ctx("/fhir/Patient/1/$everything"), &bundle, None)
            .await
            .unwrap();
        assert_eq!(out["entry"].as_array().unwrap().len(), 0);
    }
}
