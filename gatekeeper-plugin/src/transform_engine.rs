use gatekeeper_core::Claims;
use serde_json::Value;

use crate::context::RequestContext;
use crate::registry::Registry;

/// Outcome of running the response-transform chain over a single body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// The (possibly unchanged) body to return to the client.
    Body(Value),
    /// A FHIR resource was filtered out by a transformer — terminal;
    /// the coordinator must translate this into a 401.
    Suppressed,
}

/// Applies request transformers to outbound bodies and response
/// transformers to inbound bodies.
///
/// Implements the strict chain: transformers never see a body that
/// failed JSON parsing (§9 Open Questions — "the spec chose the strict
/// form"), and each transformer is handed a fresh clone of the
/// in-flight body so a misbehaving transformer cannot taint what the
/// next one sees beyond its own, intentional return value.
pub struct TransformEngine<'a> {
    registry: &'a Registry,
}

impl<'a> TransformEngine<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Returns `None` when there is no parsed JSON body to transform
    /// (empty body or non-JSON content type) or when no transformer
    /// produced a change — the original `ctx.parsed_body` should be
    /// forwarded unmodified by the caller in that case.
    pub async fn apply_request(&self, ctx: &RequestContext, claims: Option<&Claims>) -> Option<Value> {
        let original = ctx.parsed_body.as_ref()?;
        let mut current = original.clone();

        for transformer in self.registry.request_transformers() {
            let snapshot = current.clone();
            if let Some(next) = transformer.transform_request(ctx, &snapshot, claims).await {
                if next != current {
                    tracing::info!(module = %transformer.name(), "request transformer modified the body");
                } else {
                    tracing::debug!(module = %transformer.name(), "request transformer returned an unchanged body");
                }
                current = next;
            } else {
                tracing::debug!(module = %transformer.name(), "request transformer made no change");
            }
        }

        Some(current)
    }

    /// `body` is the parsed upstream response body (already decoded from
    /// JSON by the coordinator). Non-object bodies pass through
    /// unchanged — the chain is FHIR-specific.
    pub async fn apply_response(&self, ctx: &RequestContext, body: Value, claims: Option<&Claims>) -> ResponseOutcome {
        if !body.is_object() {
            return ResponseOutcome::Body(body);
        }

        let is_fhir = gatekeeper_core::fhir::is_fhir_resource(&body);
        let mut current = body;

        for transformer in self.registry.response_transformers() {
            let snapshot = current.clone();
            match transformer.transform_response(ctx, &snapshot, claims).await {
                Some(next) => {
                    if next != current {
                        tracing::info!(module = %transformer.name(), "response transformer modified the body");
                    }
                    current = next;
                }
                None if is_fhir && gatekeeper_core::fhir::is_fhir_resource(&current) => {
                    tracing::info!(module = %transformer.name(), "response transformer filtered out the resource");
                    return ResponseOutcome::Suppressed;
                }
                None => {
                    tracing::debug!(module = %transformer.name(), "response transformer made no change");
                }
            }
        }

        ResponseOutcome::Body(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Capabilities, PolicyModule};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    fn ctx_with_body(method: &str, body: Value) -> RequestContext {
        let mut headers = crate::context::HeaderMap::new();
        headers.insert("content-type", "application/json");
        RequestContext::new(method, "/fhir/Observation", vec![], headers, serde_json::to_vec(&body).unwrap())
    }

    struct Labeler;
    #[async_trait]
    impl PolicyModule for Labeler {
        fn name(&self) -> &str {
            "50_fhir_request_security"
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities { transforms_request: true, ..Default::default() }
        }
        async fn transform_request(&self, _ctx: &RequestContext, body: &Value, claims: Option<&Claims>) -> Option<Value> {
            let mut b = body.clone();
            let sub = claims?.sub()?;
            gatekeeper_core::fhir::set_security_label(&mut b, "SEC", sub, format!("Access restricted to {sub}"));
            Some(b)
        }
    }

    struct Filter;
    #[async_trait]
    impl PolicyModule for Filter {
        fn name(&self) -> &str {
            "51_fhir_response_security"
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities { transforms_response: true, ..Default::default() }
        }
        async fn transform_response(&self, _ctx: &RequestContext, body: &Value, claims: Option<&Claims>) -> Option<Value> {
            let sub = claims?.sub()?;
            if gatekeeper_core::fhir::has_security_label(body, "SEC", sub) {
                Some(body.clone())
            } else {
                None
            }
        }
    }

    fn claims_with_sub(sub: &str) -> Claims {
        let mut m = serde_json::Map::new();
        m.insert("sub".to_string(), Value::String(sub.to_string()));
        Claims::from_map(m)
    }

    #[tokio::test]
    async fn request_transform_is_none_when_body_is_not_json() {
        let ctx = RequestContext::new("POST", "/x", vec![], crate::context::HeaderMap::new(), b"not json".to_vec());
        let registry = Registry::build(vec![]);
        let engine = TransformEngine::new(&registry);
        assert_eq!(engine.apply_request(&ctx, None).await, None);
    }

    #[tokio::test]
    async fn request_transform_attaches_security_label() {
        let ctx = ctx_with_body("POST", json!({"resourceType": "Observation", "status": "final"}));
        let registry = Registry::build(vec![Arc::new(Labeler)]);
        let engine = TransformEngine::new(&registry);
        let claims = claims_with_sub("u1");
        let out = engine.apply_request(&ctx, Some(&claims)).await.unwrap();
        assert!(gatekeeper_core::fhir::has_security_label(&out, "SEC", "u1"));
    }

    #[tokio::test]
    async fn request_transform_is_idempotent() {
        let ctx = ctx_with_body("POST", json!({"resourceType": "Observation"}));
        let registry = Registry::build(vec![Arc::new(Labeler)]);
        let engine = TransformEngine::new(&registry);
        let claims = claims_with_sub("u1");

        let once = engine.apply_request(&ctx, Some(&claims)).await.unwrap();
        let ctx2 = ctx_with_body("POST", once.clone());
        let twice = engine.apply_request(&ctx2, Some(&claims)).await.unwrap();
        assert_eq!(gatekeeper_core::fhir::security_labels(&twice).len(), 1);
    }

    #[tokio::test]
    async fn response_transform_suppresses_non_matching_resource() {
        let ctx = ctx_with_body("GET", json!({}));
        let body = json!({"resourceType": "Patient", "meta": {"security": [{"system": "SEC", "code": "u2"}]}});
        let registry = Registry::build(vec![Arc::new(Filter)]);
        let engine = TransformEngine::new(&registry);
        let claims = claims_with_sub("u1");
        let out = engine.apply_response(&ctx, body, Some(&claims)).await;
        assert_eq!(out, ResponseOutcome::Suppressed);
    }

    #[tokio::test]
    async fn response_transform_allows_matching_resource() {
        let ctx = ctx_with_body("GET", json!({}));
        let body = json!({"resourceType": "Patient", "meta": {"security": [{"system": "SEC", "code": "u1"}]}});
        let registry = Registry::build(vec![Arc::new(Filter)]);
        let engine = TransformEngine::new(&registry);
        let claims = claims_with_sub("u1");
        let out = engine.apply_response(&ctx, body.clone(), Some(&claims)).await;
        assert_eq!(out, ResponseOutcome::Body(body));
    }

    #[tokio::test]
    async fn non_fhir_response_passes_through_unchanged() {
        let ctx = ctx_with_body("GET", json!({}));
        let body = json!({"hello": "world"});
        let registry = Registry::build(vec![Arc::new(Filter)]);
        let engine = TransformEngine::new(&registry);
        let out = engine.apply_response(&ctx, body.clone(), None).await;
        assert_eq!(out, ResponseOutcome::Body(body));
    }
}
