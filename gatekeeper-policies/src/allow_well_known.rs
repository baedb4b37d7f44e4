use async_trait::async_trait;
use gatekeeper_core::{Claims, Decision};
use gatekeeper_plugin::{Capabilities, PolicyModule, RequestContext};

/// Always allows requests to `/.well-known` paths, at any depth.
pub struct AllowWellKnown;

#[async_trait]
impl PolicyModule for AllowWellKnown {
    fn name(&self) -> &str {
        "00_allow_well_known"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { evaluates: true, ..Default::default() }
    }

    async fn evaluate(&self, ctx: &RequestContext, _claims: Option<&Claims>) -> Decision {
        if ctx.path_has_well_known_segment() {
            Decision::Allow
        } else {
            Decision::Undecided
        }
    }
}
