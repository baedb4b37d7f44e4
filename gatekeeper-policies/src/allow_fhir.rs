use async_trait::async_trait;
use gatekeeper_core::{Claims, Decision};
use gatekeeper_plugin::{Capabilities, PolicyModule, RequestContext};

/// Allows all requests under `/fhir/`. Access control at the resource
/// level is left to the FHIR security transformers, not this rule.
pub struct AllowFhir;

#[async_trait]
impl PolicyModule for AllowFhir {
    fn name(&self) -> &str {
        "10_allow_fhir"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { evaluates: true, ..Default::default() }
    }

    async fn evaluate(&self, ctx: &RequestContext, _claims: Option<&Claims>) -> Decision {
        if ctx.path_starts_with("/fhir/") {
            Decision::Allow
        } else {
            Decision::Undecided
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_plugin::context::HeaderMap;

    fn ctx(path: &str) -> RequestContext {
        RequestContext::new("GET", path, vec![], HeaderMap::new(), vec![])
    }

    #[tokio::test]
    async fn allows_fhir_prefixed_path() {
        let d = AllowFhir.evaluate(&ctx("/fhir/Patient/1"), None).await;
        assert_eq!(d, Decision::Allow);
    }

    #[tokio::test]
    async fn undecided_for_other_paths() {
        let d = AllowFhir.evaluate(&ctx("/admin/settings"), None).await;
        assert_eq!(d, Decision::Undecided);
    }
}
