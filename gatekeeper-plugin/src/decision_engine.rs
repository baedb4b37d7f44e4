use gatekeeper_core::{Claims, Decision};

use crate::context::RequestContext;
use crate::registry::Registry;

/// Evaluates a request against the Registry's decision rules in order,
/// returning the first terminal decision. `Undecided` rules are skipped.
pub struct DecisionEngine<'a> {
    registry: &'a Registry,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    pub async fn evaluate(&self, ctx: &RequestContext, claims: Option<&Claims>) -> Decision {
        for rule in self.registry.decision_rules() {
            let decision = rule.evaluate(ctx, claims).await;
            tracing::debug!(module = %rule.name(), decision = ?decision, "policy rule evaluated");
            if decision.is_terminal() {
                return decision;
            }
        }
        Decision::Undecided
    }
}
