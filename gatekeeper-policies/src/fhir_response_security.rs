//! Filters FHIR response bodies down to resources carrying the
//! requesting user's security label.

use async_trait::async_trait;
use gatekeeper_core::fhir;
use gatekeeper_core::Claims;
use gatekeeper_plugin::{Capabilities, PolicyModule, RequestContext};
use serde_json::Value;

pub struct FhirResponseSecurity {
    system: String,
}

impl FhirResponseSecurity {
    pub fn new(system: impl Into<String>) -> Self {
        Self { system: system.into() }
    }
}

#[async_trait]
impl PolicyModule for FhirResponseSecurity {
    fn name(&self) -> &str {
        "51_fhir_response_security"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { transforms_response: true, ..Default::default() }
    }

    async fn transform_response(&self, ctx: &RequestContext, body: &Value, claims: Option<&Claims>) -> Option<Value> {
        if ctx.method != "GET" {
            return None;
        }

        let sub = claims.and_then(Claims::sub);

        let Some(sub) = sub else {
            // No identified user — Bundles are emptied but still returned;
            // a bare FHIR resource is suppressed entirely.
            if fhir::is_bundle(body) {
                let mut out = body.clone();
                fhir::replace_bundle_entries(&mut out, Vec::new());
                return Some(out);
            }
            return None;
        };

        if fhir::is_bundle(body) {
            // A Bundle with no (or non-array) `entry` is returned unchanged —
            // only a present entry array gets filtered.
            let Some(entries) = fhir::bundle_entries(body) else {
                return Some(body.clone());
            };
            let filtered: Vec<Value> = entries
                .iter()
                .filter(|entry| fhir::entry_resource(entry).is_some_and(|r| fhir::has_security_label(r, &self.system, sub)))
                .cloned()
                .collect();
            let mut out = body.clone();
            fhir::replace_bundle_entries(&mut out, filtered);
            return Some(out);
        }

        if fhir::is_fhir_resource(body) {
            if fhir::has_security_label(body, &self.system, sub) {
                return Some(body.clone());
            }
            return None;
        }

        None
    }
}
