use std::sync::Arc;

use crate::policy::PolicyModule;

/// Thread-safe, immutable-after-build policy registry.
///
/// Built once at startup from an explicit, ordered list of modules (see
/// `gatekeeper_policies::register_all`); never mutated during request
/// handling. Workers receive a shared `Arc<Registry>`.
pub struct Registry {
    decision_rules: Vec<Arc<dyn PolicyModule>>,
    request_transformers: Vec<Arc<dyn PolicyModule>>,
    response_transformers: Vec<Arc<dyn PolicyModule>>,
}

impl Registry {
    /// Sort `modules` by discovery name (byte-wise ascending — this
    /// ordering is load-bearing, callers rely on numeric filename
    /// prefixes establishing precedence) and split into the three
    /// immutable ordered views by declared capability.
    pub fn build(mut modules: Vec<Arc<dyn PolicyModule>>) -> Self {
        modules.sort_by(|a, b| a.name().cmp(b.name()));

        let mut decision_rules = Vec::new();
        let mut request_transformers = Vec::new();
        let mut response_transformers = Vec::new();

        for module in modules {
            let caps = module.capabilities();
            if !caps.evaluates && !caps.transforms_request && !caps.transforms_response {
                tracing::warn!(module = %module.name(), "policy module declares no capabilities, ignoring");
                continue;
            }
            if caps.evaluates {
                decision_rules.push(Arc::clone(&module));
            }
            if caps.transforms_request {
                request_transformers.push(Arc::clone(&module));
            }
            if caps.transforms_response {
                response_transformers.push(Arc::clone(&module));
            }
            tracing::info!(module = %module.name(), "loaded policy module");
        }

        Self { decision_rules, request_transformers, response_transformers }
    }

    pub fn decision_rules(&self) -> &[Arc<dyn PolicyModule>] {
        &self.decision_rules
    }

    pub fn request_transformers(&self) -> &[Arc<dyn PolicyModule>] {
        &self.request_transformers
    }

    pub fn response_transformers(&self) -> &[Arc<dyn PolicyModule>] {
        &self.response_transformers
    }

    pub fn len(&self) -> usize {
        self.decision_rules.len() + self.request_transformers.len() + self.response_transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decision_rules.is_empty() && self.request_transformers.is_empty() && self.response_transformers.is_empty()
    }
}
