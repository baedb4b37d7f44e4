//! Audit event sinks.
//!
//! [`AuditSink`] is the pluggable seam the Pipeline Coordinator pushes
//! every [`AuditEvent`] through. [`HttpAuditSink`] adapts the batched
//! mpsc-channel-plus-flush-loop shape used elsewhere in this workspace
//! for shipping structured records to a remote collector; a failed or
//! slow-to-drain push never blocks or fails the request path — `record`
//! is a non-blocking `try_send`, and delivery failures are only logged.

use gatekeeper_core::AuditEvent;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, warn};

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Discards every event. Used when no `logserver_url` is configured.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

/// Pushes batched NDJSON to a remote collector over HTTP.
pub struct HttpAuditSink {
    sender: mpsc::Sender<AuditEvent>,
}

const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 5;
const CHANNEL_CAPACITY: usize = 10_000;

impl HttpAuditSink {
    /// Spawns the background flush task. `token` is sent as a bearer
    /// token when present.
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        let endpoint = endpoint.into();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(Self::flush_loop(endpoint, token, rx));
        Self { sender: tx }
    }

    async fn flush_loop(endpoint: String, token: Option<String>, mut rx: mpsc::Receiver<AuditEvent>) {
        let client = reqwest::Client::new();
        let mut batch: Vec<AuditEvent> = Vec::with_capacity(DEFAULT_BATCH_SIZE);
        let mut flush_interval = interval(Duration::from_secs(DEFAULT_FLUSH_INTERVAL_SECS));

        loop {
            tokio::select! {
                Some(event) = rx.recv() => {
                    batch.push(event);
                    if batch.len() >= DEFAULT_BATCH_SIZE {
                        Self::flush(&client, &endpoint, token.as_deref(), &mut batch).await;
                    }
                }
                _ = flush_interval.tick() => {
                    if !batch.is_empty() {
                        Self::flush(&client, &endpoint, token.as_deref(), &mut batch).await;
                    }
                }
            }
        }
    }

    async fn flush(client: &reqwest::Client, endpoint: &str, token: Option<&str>, batch: &mut Vec<AuditEvent>) {
        if batch.is_empty() {
            return;
        }
        let mut body = String::new();
        for event in batch.iter() {
            if let Ok(line) = serde_json::to_string(event) {
                body.push_str(&line);
                body.push('\n');
            }
        }
        let count = batch.len();
        let mut request = client.post(endpoint).header("Content-Type", "application/stream+json").body(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(count, "flushed audit events");
            }
            Ok(resp) => {
                error!(status = %resp.status(), "audit log push rejected");
            }
            Err(e) => {
                error!(error = %e, "audit log push failed");
            }
        }
        batch.clear();
    }
}

impl AuditSink for HttpAuditSink {
    fn record(&self, event: AuditEvent) {
        if self.sender.try_send(event).is_err() {
            warn!("audit event dropped — sink channel full or closed");
        }
    }
}

/// Build the configured sink: [`HttpAuditSink`] when both `logserver_url`
/// and a bearer token are present (mirroring the original's
/// `if LOGSERVER_URL and LOGSERVER_TOKEN` gate), else [`NullAuditSink`].
pub fn build_sink(logserver_url: Option<&str>, logserver_token: Option<&str>) -> Box<dyn AuditSink> {
    match (logserver_url, logserver_token) {
        (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => Box::new(HttpAuditSink::new(url.to_string(), Some(token.to_string()))),
        _ => Box::new(NullAuditSink),
    }
}
