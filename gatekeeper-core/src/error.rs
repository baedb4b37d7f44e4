use thiserror::Error;

/// Unified error type for the gateway.
///
/// Every variant knows its own HTTP status and JSON body shape so the
/// coordinator never has to re-derive either from a bare string.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("token missing")]
    AuthMissing,

    #[error("token expired")]
    AuthExpired,

    #[error("token invalid: {0}")]
    AuthInvalid(String),

    #[error("policy denied: {0}")]
    PolicyDeny(String),

    #[error("Access denied: {0}")]
    ResourceSuppressed(String),

    #[error("upstream error: {0}")]
    UpstreamError(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl GatewayError {
    /// Map to the HTTP status code the coordinator must answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::AuthMissing => 400,
            GatewayError::AuthExpired => 401,
            GatewayError::AuthInvalid(_) => 401,
            GatewayError::PolicyDeny(_) => 403,
            GatewayError::ResourceSuppressed(_) => 401,
            GatewayError::UpstreamError(_) => 502,
            GatewayError::ConfigError(_) => 500,
            GatewayError::Internal(_) => 500,
            GatewayError::Io(_) => 500,
            GatewayError::Serde(_) => 500,
        }
    }

    /// Render the per-variant JSON error body.
    ///
    /// `AuthMissing`/`AuthExpired` use `{"message": ...}` (matching the
    /// identity-provider-facing error shape); policy and suppression
    /// errors use `{"description": ...}`; everything else falls back to
    /// `{"error": ...}`.
    pub fn to_json_body(&self) -> serde_json::Value {
        match self {
            GatewayError::AuthMissing => serde_json::json!({ "message": "token missing" }),
            GatewayError::AuthExpired => serde_json::json!({ "message": "token expired" }),
            GatewayError::AuthInvalid(msg) => serde_json::json!({ "message": msg }),
            GatewayError::PolicyDeny(reason) => serde_json::json!({ "description": reason }),
            GatewayError::ResourceSuppressed(desc) => serde_json::json!({ "description": desc }),
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_missing_is_400_with_message_body() {
        let err = GatewayError::AuthMissing;
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_json_body(), serde_json::json!({ "message": "token missing" }));
    }

    #[test]
    fn auth_expired_is_401_with_message_body() {
        let err = GatewayError::AuthExpired;
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.to_json_body(), serde_json::json!({ "message": "token expired" }));
    }

    #[test]
    fn policy_deny_is_403_with_description_body() {
        let err = GatewayError::PolicyDeny("no matching rule found".into());
        assert_eq!(err.status_code(), 403);
        assert_eq!(
            err.to_json_body(),
            serde_json::json!({ "description": "no matching rule found" })
        );
    }

    #[test]
    fn resource_suppressed_is_401() {
        let err = GatewayError::ResourceSuppressed("Access denied: not your resource".into());
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn upstream_error_is_502() {
        assert_eq!(GatewayError::UpstreamError("timeout".into()).status_code(), 502);
    }

    #[test]
    fn internal_error_is_500() {
        assert_eq!(GatewayError::Internal("oops".into()).status_code(), 500);
    }
}
