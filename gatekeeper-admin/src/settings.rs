//! Read-only, non-secret view of the running configuration.
//!
//! Mirrors the original deployment's `/settings` and `/settings/{key}`
//! endpoints: every [`GatewayConfig`] field is exposed by its uppercased
//! name, except any key whose uppercased form contains `SECRET`, `KEY`,
//! or `TOKEN` — those are refused outright rather than redacted, matching
//! the original's blacklist gate (extended to cover `logserver_token`,
//! which the original's `("SECRET", "KEY")` list never caught).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use gatekeeper_core::GatewayConfig;
use serde_json::{json, Map, Value};

const BLACKLIST: [&str; 3] = ["SECRET", "KEY", "TOKEN"];

fn is_blacklisted(key: &str) -> bool {
    let upper = key.to_uppercase();
    BLACKLIST.iter().any(|pattern| upper.contains(pattern))
}

fn config_as_map(config: &GatewayConfig) -> Map<String, Value> {
    match serde_json::to_value(config) {
        Ok(Value::Object(map)) => map.into_iter().map(|(k, v)| (k.to_uppercase(), v)).collect(),
        _ => Map::new(),
    }
}

pub async fn list_settings(State(config): State<std::sync::Arc<GatewayConfig>>) -> Json<Value> {
    let map = config_as_map(&config);
    let filtered: Map<String, Value> = map.into_iter().filter(|(k, _)| !is_blacklisted(k)).collect();
    Json(Value::Object(filtered))
}

pub async fn get_setting(State(config): State<std::sync::Arc<GatewayConfig>>, Path(key): Path<String>) -> impl IntoResponse {
    let upper = key.to_uppercase();
    if is_blacklisted(&upper) {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": format!("Configuration key {upper} not available")}))).into_response();
    }

    let map = config_as_map(&config);
    let value = map.get(&upper).cloned().unwrap_or(Value::Null);
    (StatusCode::OK, Json(json!({ upper: value }))).into_response()
}
