use std::sync::Arc;

use gatekeeper_core::GatewayConfig;
use gatekeeper_observability::AuditSink;
use gatekeeper_plugin::Registry;

use crate::jwks::JwksCache;

/// Shared, immutable-after-startup state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<Registry>,
    pub jwks: Arc<JwksCache>,
    pub audit: Arc<dyn AuditSink>,
    pub upstream: reqwest::Client,
}
