use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// The Keycloak security-labels system URI used as the ownership marker
/// on `meta.security` entries, unless overridden by configuration.
pub fn default_security_system() -> String {
    "http://keycloak.cirg.uw.edu/fhir/security-labels".to_string()
}

/// Coding system used to mark a FHIR element as explicitly absent/unknown
/// (International Patient Summary absent-unknown code system).
pub const ABSENT_UNKNOWN_SYSTEM: &str = "http://hl7.org/fhir/uv/ips/CodeSystem/absent-unknown-uv-ips";

/// Top-level process configuration for the gateway.
///
/// Loaded once at startup via [`GatewayConfig::load`] and shared
/// read-only (`Arc`) across every request thereafter — see the
/// concurrency model: configuration is immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: std::net::SocketAddr,

    /// JWKS endpoint used to verify inbound bearer tokens.
    #[serde(default)]
    pub jwks_url: String,

    /// Base URL of the upstream FHIR server requests are forwarded to.
    #[serde(default)]
    pub upstream_server: String,

    /// Exact paths that bypass JWT verification, policy evaluation, and
    /// transformation entirely.
    #[serde(default = "default_path_whitelist", deserialize_with = "de_comma_list")]
    pub path_whitelist: Vec<String>,

    /// OIDC authorization endpoint, surfaced via the smart-configuration
    /// discovery document.
    #[serde(default)]
    pub oidc_authorize_url: String,

    /// OIDC token endpoint, surfaced via the smart-configuration
    /// discovery document.
    #[serde(default)]
    pub oidc_token_uri: String,

    /// OIDC token introspection endpoint, surfaced via the
    /// smart-configuration discovery document.
    #[serde(default)]
    pub oidc_token_introspection_uri: String,

    /// Remote audit log sink. `None` disables the push entirely.
    #[serde(default)]
    pub logserver_url: Option<String>,

    /// Bearer token presented to `logserver_url`.
    #[serde(default)]
    pub logserver_token: Option<String>,

    /// `tracing` filter directive, e.g. `"info"`, `"debug"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Recognized for parity with the original deployment surface.
    /// In this port policy modules are registered at build time
    /// (see [`crate::config`] docs on the Registry); this only
    /// controls whether a "custom policies present" line is logged.
    #[serde(default)]
    pub policies_dir: Option<String>,

    /// The configured security-label system URI (see
    /// [`default_security_system`]).
    #[serde(default = "default_security_system")]
    pub security_system: String,

    /// How long a resolved JWKS key is cached before being re-fetched.
    #[serde(default = "default_jwks_cache_ttl_secs")]
    pub jwks_cache_ttl_secs: u64,

    /// Bounded timeout for the JWKS fetch and the upstream call.
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,

    /// Maximum accepted request body size, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl GatewayConfig {
    /// Load configuration from an optional YAML file plus environment
    /// variable overrides. Environment variables always win.
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        } else {
            for default_path in &["gatekeeper.yaml", "/etc/gatekeeper/gatekeeper.yaml"] {
                if std::path::Path::new(default_path).exists() {
                    figment = figment.merge(Yaml::file(default_path));
                    break;
                }
            }
        }

        figment = figment.merge(Env::raw());

        let config: Self = figment.extract()?;
        Ok(config)
    }

    /// Expected JWT audience claim, fixed for this deployment shape.
    pub fn expected_audience(&self) -> &'static str {
        "account"
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            jwks_url: String::new(),
            upstream_server: String::new(),
            path_whitelist: default_path_whitelist(),
            oidc_authorize_url: String::new(),
            oidc_token_uri: String::new(),
            oidc_token_introspection_uri: String::new(),
            logserver_url: None,
            logserver_token: None,
            log_level: default_log_level(),
            policies_dir: None,
            security_system: default_security_system(),
            jwks_cache_ttl_secs: default_jwks_cache_ttl_secs(),
            upstream_timeout_ms: default_upstream_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn de_comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => Ok(s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()),
        OneOrMany::Many(v) => Ok(v),
    }
}

fn default_listen_addr() -> std::net::SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_path_whitelist() -> Vec<String> {
    vec!["/hapi-fhir-jpaserver/fhir/metadata".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_jwks_cache_ttl_secs() -> u64 {
    300
}

fn default_upstream_timeout_ms() -> u64 {
    15_000
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024 // 10MB — FHIR Bundles can be large
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_the_builtin_whitelist_and_security_system() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.path_whitelist, vec!["/hapi-fhir-jpaserver/fhir/metadata".to_string()]);
        assert_eq!(cfg.security_system, "http://keycloak.cirg.uw.edu/fhir/security-labels");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.expected_audience(), "account");
    }

    #[test]
    fn jwks_cache_ttl_defaults_to_five_minutes() {
        assert_eq!(GatewayConfig::default().jwks_cache_ttl_secs, 300);
    }

    #[test]
    fn comma_list_splits_and_trims() {
        let json = serde_json::json!({"path_whitelist": "/a , /b,/c"});
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(deserialize_with = "de_comma_list")]
            path_whitelist: Vec<String>,
        }
        let w: Wrapper = serde_json::from_value(json).unwrap();
        assert_eq!(w.path_whitelist, vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn comma_list_accepts_already_split_array() {
        let json = serde_json::json!({"path_whitelist": ["/a", "/b"]});
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(deserialize_with = "de_comma_list")]
            path_whitelist: Vec<String>,
        }
        let w: Wrapper = serde_json::from_value(json).unwrap();
        assert_eq!(w.path_whitelist, vec!["/a", "/b"]);
    }
}
