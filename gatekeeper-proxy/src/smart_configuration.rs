//! `GET /fhir/.well-known/smart-configuration` — the SMART-on-FHIR
//! discovery document. Exempt from authentication, policy, and
//! transformation like every other well-known path (§2.1 `00_allow_well_known`).

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn smart_configuration(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "authorization_endpoint": state.config.oidc_authorize_url,
        "token_endpoint": state.config.oidc_token_uri,
        "introspection_endpoint": state.config.oidc_token_introspection_uri,
    }))
}
