//! Liveness probe. No upstream or dependency checks — just confirms the
//! process is accepting connections.

use axum::response::Json;
use serde_json::{json, Value};

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthz_reports_ok() {
        let Json(body) = healthz().await;
        assert_eq!(body["status"], "ok");
    }
}
