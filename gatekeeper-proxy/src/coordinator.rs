//! The Pipeline Coordinator (§5): the single request path every
//! non-whitelisted call to the gateway passes through — authenticate,
//! decide, transform the request, forward, transform the response,
//! audit.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{HeaderMap as AxumHeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use gatekeeper_core::{Claims, Decision, GatewayError};
use gatekeeper_plugin::context::{is_json_media_type, HeaderMap};
use gatekeeper_plugin::{DecisionEngine, RequestContext, ResponseOutcome, TransformEngine};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Request/response headers that must never be forwarded verbatim
/// between the client and the upstream leg.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

pub async fn proxy_handler(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    match handle(&state, req).await {
        Ok(response) => response,
        Err(err) => error_response(err),
    }
}

fn error_response(err: GatewayError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    warn!(status = status.as_u16(), error = %err, "request rejected");
    (status, axum::Json(err.to_json_body())).into_response()
}

async fn handle(state: &AppState, req: Request<Body>) -> Result<Response, GatewayError> {
    let request_id = Uuid::new_v4().to_string();
    let (parts, body) = req.into_parts();
    let method = parts.method.as_str().to_string();
    let path = parts.uri.path().to_string();
    let query = parse_query(parts.uri.query().unwrap_or(""));
    let headers = to_plugin_headers(&parts.headers);

    let raw_body = to_bytes(body, state.config.max_body_bytes)
        .await
        .map_err(|e| GatewayError::Internal(format!("failed to read request body: {e}")))?
        .to_vec();

    let ctx = RequestContext::new(method.clone(), path.clone(), query, headers, raw_body);

    if state.config.path_whitelist.iter().any(|p| p == &ctx.path) {
        return forward(state, &ctx, &request_id, None).await;
    }

    let token = bearer_token(&parts.headers).ok_or(GatewayError::AuthMissing)?;
    let claims = state.jwks.verify(&token, state.config.expected_audience()).await?;

    let decision_engine = DecisionEngine::new(&state.registry);
    match decision_engine.evaluate(&ctx, Some(&claims)).await {
        Decision::Allow => {}
        Decision::Deny(reason) => return Err(GatewayError::PolicyDeny(reason)),
        Decision::Undecided => return Err(GatewayError::Internal("no policy rule reached a decision".to_string())),
    }

    forward(state, &ctx, &request_id, Some(&claims)).await
}

fn bearer_token(headers: &AxumHeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.rsplit("Bearer ").next().unwrap_or(value);
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn parse_query(raw: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw.as_bytes()).into_owned().collect()
}

fn to_plugin_headers(headers: &AxumHeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            out.insert(name.as_str().to_string(), v.to_string());
        }
    }
    out
}

async fn forward(state: &AppState, ctx: &RequestContext, request_id: &str, claims: Option<&Claims>) -> Result<Response, GatewayError> {
    let outbound_body = if let Some(claims) = claims {
        let transform_engine = TransformEngine::new(&state.registry);
        match transform_engine.apply_request(ctx, Some(claims)).await {
            Some(body) => serde_json::to_vec(&body).map_err(GatewayError::Serde)?,
            None => ctx.raw_body.clone(),
        }
    } else {
        ctx.raw_body.clone()
    };

    let url = upstream_url(&state.config.upstream_server, &ctx.path, &ctx.query);
    let method = reqwest::Method::from_bytes(ctx.method.as_bytes()).map_err(|e| GatewayError::Internal(e.to_string()))?;

    let mut builder = state
        .upstream
        .request(method, url)
        .timeout(Duration::from_millis(state.config.upstream_timeout_ms))
        .body(outbound_body);

    for (name, value) in ctx.headers.iter() {
        if HOP_BY_HOP.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            builder = builder.header(name, value);
        }
    }

    let upstream_response = builder.send().await.map_err(|e| GatewayError::UpstreamError(e.to_string()))?;

    let status = upstream_response.status().as_u16();
    let content_type = upstream_response.headers().get(axum::http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
    let body_bytes = upstream_response.bytes().await.map_err(|e| GatewayError::UpstreamError(e.to_string()))?;

    let final_status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = if ctx.method == "GET" && is_json_media_type(&content_type) && !body_bytes.is_empty() {
        match serde_json::from_slice::<Value>(&body_bytes) {
            Ok(parsed) => {
                let transform_engine = TransformEngine::new(&state.registry);
                match transform_engine.apply_response(ctx, parsed, claims).await {
                    ResponseOutcome::Body(body) => (final_status, axum::Json(body)).into_response(),
                    ResponseOutcome::Suppressed => return Err(GatewayError::ResourceSuppressed("Access denied".to_string())),
                }
            }
            Err(_) => (final_status, body_bytes.to_vec()).into_response(),
        }
    } else {
        (final_status, body_bytes.to_vec()).into_response()
    };

    if let Ok(header_value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(HeaderName::from_static("x-request-id"), header_value);
    }

    if claims.is_some() && upstream_response_is_success(status) && is_mutating(&ctx.method) {
        audit(state, ctx, claims);
    }

    Ok(response)
}

fn upstream_response_is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn is_mutating(method: &str) -> bool {
    matches!(method, "POST" | "PUT" | "DELETE" | "PATCH")
}

fn upstream_url(upstream_server: &str, path: &str, query: &[(String, String)]) -> String {
    let base = upstream_server.trim_end_matches('/');
    let mut url = format!("{base}{path}");
    if !query.is_empty() {
        let encoded: String = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(query).finish();
        url.push('?');
        url.push_str(&encoded);
    }
    url
}

fn audit(state: &AppState, ctx: &RequestContext, claims: Option<&Claims>) {
    let event = gatekeeper_core::audit::AuditEventBuilder {
        method: &ctx.method,
        path: &ctx.path,
        user: claims.and_then(|c| c.user_identifier()).map(String::from),
        resource: ctx.parsed_body.as_ref(),
        resource_type: None,
        resource_id: None,
        params: None,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
    .build();
    info!(message = %event.message, "audit event recorded");
    state.audit.record(event);
}
