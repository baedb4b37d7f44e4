use async_trait::async_trait;
use gatekeeper_core::{Claims, Decision};
use gatekeeper_plugin::{Capabilities, PolicyModule, RequestContext};

/// Catch-all: denies any request no earlier rule allowed. Must sort last
/// among decision rules — the `99_` discovery-name prefix guarantees it.
pub struct DefaultDeny;

#[async_trait]
impl PolicyModule for DefaultDeny {
    fn name(&self) -> &str {
        "99_default_deny"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { evaluates: true, ..Default::default() }
    }

    async fn evaluate(&self, _ctx: &RequestContext, _claims: Option<&Claims>) -> Decision {
        Decision::Deny("Request denied by default policy - no matching rule found".to_string())
    }
}
