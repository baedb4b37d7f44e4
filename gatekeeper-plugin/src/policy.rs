//! The Policy/Transformer Module ABI (§2.1, §4.1, §9).
//!
//! A module is a value implementing [`PolicyModule`]; it declares which
//! of the three capabilities it exercises via [`PolicyModule::capabilities`]
//! (the typed stand-in for the original's `hasattr(module, "evaluate")`
//! style reflection — §9 DESIGN NOTES). Registration is explicit and
//! build-time (`gatekeeper_policies::register_all`), not a runtime
//! directory scan, but the load-bearing ordering contract — strict
//! lexicographic order of discovery names — is preserved.

use async_trait::async_trait;
use gatekeeper_core::{Claims, Decision};
use serde_json::Value;

use crate::context::RequestContext;

/// Which of the three optional capabilities a module exercises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub evaluates: bool,
    pub transforms_request: bool,
    pub transforms_response: bool,
}

#[async_trait]
pub trait PolicyModule: Send + Sync {
    /// Discovery name, carrying the load-bearing numeric prefix
    /// (e.g. `"00_allow_well_known"`).
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Evaluate the request; only called when `capabilities().evaluates`.
    async fn evaluate(&self, _ctx: &RequestContext, _claims: Option<&Claims>) -> Decision {
        Decision::Undecided
    }

    /// Transform an outbound request body; only called when
    /// `capabilities().transforms_request`. `None` means no change.
    async fn transform_request(&self, _ctx: &RequestContext, _body: &Value, _claims: Option<&Claims>) -> Option<Value> {
        None
    }

    /// Transform an inbound response body; only called when
    /// `capabilities().transforms_response`. `None` means either "no
    /// change" (non-FHIR body) or "suppressed" (FHIR body) — the
    /// distinction is made by the Transform Engine, not the module.
    async fn transform_response(&self, _ctx: &RequestContext, _body: &Value, _claims: Option<&Claims>) -> Option<Value> {
        None
    }
}
