//! JWKS-backed bearer token verification.
//!
//! Fetches the identity provider's key set over HTTP and caches it for
//! `jwks_cache_ttl_secs` (§4.2); a stale cache is refetched in full
//! rather than refreshed key-by-key, matching the small, infrequently
//! rotated key sets typical of a single Keycloak realm.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use gatekeeper_core::{Claims, GatewayError};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

struct CacheState {
    fetched_at: Option<Instant>,
    keys: HashMap<String, DecodingKey>,
}

pub struct JwksCache {
    client: reqwest::Client,
    jwks_url: String,
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl JwksCache {
    pub fn new(client: reqwest::Client, jwks_url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            client,
            jwks_url: jwks_url.into(),
            ttl,
            state: RwLock::new(CacheState { fetched_at: None, keys: HashMap::new() }),
        }
    }

    fn is_stale(fetched_at: Option<Instant>, ttl: Duration) -> bool {
        match fetched_at {
            Some(at) => at.elapsed() >= ttl,
            None => true,
        }
    }

    async fn refresh(&self) -> Result<(), GatewayError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamError(format!("jwks fetch failed: {e}")))?;

        let jwk_set: JwkSet = response
            .json()
            .await
            .map_err(|e| GatewayError::UpstreamError(format!("jwks response malformed: {e}")))?;

        let mut keys = HashMap::with_capacity(jwk_set.keys.len());
        for jwk in jwk_set.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                continue;
            };
            if let Ok(key) = DecodingKey::from_rsa_components(n, e) {
                keys.insert(jwk.kid, key);
            }
        }

        let mut state = self.state.write().await;
        state.keys = keys;
        state.fetched_at = Some(Instant::now());
        Ok(())
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey, GatewayError> {
        {
            let state = self.state.read().await;
            if !Self::is_stale(state.fetched_at, self.ttl) {
                if let Some(key) = state.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        self.refresh().await?;

        let state = self.state.read().await;
        state.keys.get(kid).cloned().ok_or_else(|| GatewayError::AuthInvalid("unknown key id".to_string()))
    }

    /// Verify `token`'s signature and claims (audience, expiry) against
    /// the cached JWKS, returning the decoded claim set on success.
    pub async fn verify(&self, token: &str, expected_audience: &str) -> Result<Claims, GatewayError> {
        let header = jsonwebtoken::decode_header(token).map_err(|e| GatewayError::AuthInvalid(e.to_string()))?;
        let kid = header.kid.ok_or_else(|| GatewayError::AuthInvalid("token header missing kid".to_string()))?;
        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[expected_audience]);

        let data = jsonwebtoken::decode::<serde_json::Map<String, Value>>(token, &key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => GatewayError::AuthExpired,
            _ => GatewayError::AuthInvalid(e.to_string()),
        })?;

        Ok(Claims::from_map(data.claims))
    }
}
