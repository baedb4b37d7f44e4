//! Adds `meta.security` labels to FHIR resources on create/update so that
//! `51_fhir_response_security` can later recognize their owner.

use async_trait::async_trait;
use gatekeeper_core::fhir;
use gatekeeper_core::Claims;
use gatekeeper_plugin::{Capabilities, PolicyModule, RequestContext};
use serde_json::Value;

pub struct FhirRequestSecurity {
    system: String,
}

impl FhirRequestSecurity {
    pub fn new(system: impl Into<String>) -> Self {
        Self { system: system.into() }
    }
}

#[async_trait]
impl PolicyModule for FhirRequestSecurity {
    fn name(&self) -> &str {
        "50_fhir_request_security"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { transforms_request: true, ..Default::default() }
    }

    async fn transform_request(&self, ctx: &RequestContext, body: &Value, claims: Option<&Claims>) -> Option<Value> {
        if ctx.method != "POST" && ctx.method != "PUT" {
            return None;
        }
        let sub = claims?.sub()?;
        if !fhir::is_fhir_resource(body) {
            return None;
        }

        if fhir::is_bundle(body) && fhir::bundle_type(body) == Some("transaction") {
            let entries = fhir::bundle_entries(body)?;
            let mut labeled = Vec::with_capacity(entries.len());
            let mut processed = 0u32;
            for entry in entries {
                let mut entry = entry.clone();
                let is_write = matches!(fhir::entry_request_method(&entry).as_deref(), Some("POST") | Some("PUT"));
                if is_write {
                    if let Some(mut resource) = entry.get("resource").cloned() {
                        if fhir::is_fhir_resource(&resource) {
                            fhir::set_security_label(&mut resource, &self.system, sub, format!("Access restricted to {sub}"));
                            entry["resource"] = resource;
                            processed += 1;
                        }
                    }
                }
                labeled.push(entry);
            }
            tracing::info!(count = processed, "labeled resources in transaction bundle");
            let mut out = body.clone();
            out["entry"] = Value::Array(labeled);
            return Some(out);
        }

        let mut out = body.clone();
        fhir::set_security_label(&mut out, &self.system, sub, format!("Access restricted to {sub}"));
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_plugin::context::HeaderMap;
    use serde_json::json;

    const SYS: &str = "http://keycloak.cirg.uw.edu/fhir/security-labels";

    fn ctx(method: &str) -> RequestContext {
        let mut h = HeaderMap::new();
        h.insert("content-type", "application/json");
        RequestContext::new(method, "/fhir/Observation", vec![], h, vec![])
    }

    fn claims(sub: &str) -> Claims {
        let mut m = serde_json::Map::new();
        m.insert("sub".to_string(), Value::String(sub.to_string()));
        Claims::from_map(m)
    }

    #[tokio::test]
    async fn skips_non_write_methods() {
        let out = FhirRequestSecurity::new(SYS)
            .transform_request(&ctx("GET"), &json!({"resourceType": "Observation"}), Some(&claims("u1")))
            .await;
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn skips_when_no_claims() {
        let out = FhirRequestSecurity::new(SYS).transform_request(&ctx("POST"), &json!({"resourceType": "Observation"}), None).await;
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn labels_single_resource() {
        let out = FhirRequestSecurity::new(SYS)
            .transform_request(&ctx("POST"), &json!({"resourceType": "Observation"}), Some(&claims("u1")))
            .await
            .unwrap();
        assert!(fhir::has_security_label(&out, SYS, "u1"));
    }

    #[tokio::test]
    async fn labels_only_write_entries_in_transaction_bundle() {
        let bundle = json!({
            "resourceType": "Bundle",
            "type": "transaction",
            "entry": [
                {"request": {"method": "POST"}, "resource": {"resourceType": "Observation"}},
                {"request": {"method": "GET"}, "resource": {"resourceType": "Patient"}},
            ]
        });
        let out = FhirRequestSecurity::new(SYS).transform_request(&ctx("POST"), &bundle, Some(&claims("u1"))).await.unwrap();
        let entries = out["entry"].as_array().unwrap();
        assert!(fhir::has_security_label(&entries[0]["resource"], SYS, "u1"));
        assert!(!fhir::has_security_label(&entries[1]["resource"], SYS, "u1"));
    }

    #[tokio::test]
    async fn non_transaction_bundles_are_treated_as_a_single_resource() {
        let bundle = json!({"resourceType": "Bundle", "type": "collection", "entry": []});
        let out = FhirRequestSecurity::new(SYS).transform_request(&ctx("POST"), &bundle, Some(&claims("u1"))).await.unwrap();
        assert!(fhir::has_security_label(&out, SYS, "u1"));
    }
}
