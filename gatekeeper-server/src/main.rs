// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Gatekeeper — authenticating reverse proxy for FHIR backends
//
//  A single axum app: the Pipeline Coordinator's catch-all proxy
//  route, SMART discovery, and the read-only admin surface all run
//  on one listener.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use gatekeeper_core::GatewayConfig;
use gatekeeper_proxy::{AppState, JwksCache};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gatekeeper", version, about = "Authenticating reverse proxy and policy pipeline for FHIR backends")]
struct Cli {
    /// Path to a YAML configuration file. Falls back to `gatekeeper.yaml`,
    /// then `/etc/gatekeeper/gatekeeper.yaml`, then built-in defaults —
    /// environment variables always take precedence over any of these.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = GatewayConfig::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)))
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "gatekeeper starting");

    if let Some(dir) = &config.policies_dir {
        info!(dir = %dir, "custom policies directory configured (ignored — modules are registered at build time)");
    }

    let config = Arc::new(config);
    let modules = gatekeeper_policies::register_all(&config);
    let registry = Arc::new(gatekeeper_plugin::Registry::build(modules));
    info!(modules = registry.len(), "policy modules loaded");

    let audit = Arc::from(gatekeeper_observability::build_sink(config.logserver_url.as_deref(), config.logserver_token.as_deref()));
    let upstream = reqwest::Client::new();
    let jwks = Arc::new(JwksCache::new(upstream.clone(), config.jwks_url.clone(), Duration::from_secs(config.jwks_cache_ttl_secs)));

    let app_state = Arc::new(AppState {
        config: config.clone(),
        registry,
        jwks,
        audit,
        upstream,
    });

    let proxy_router = Router::new()
        .route("/fhir/.well-known/smart-configuration", get(gatekeeper_proxy::smart_configuration))
        .fallback(gatekeeper_proxy::proxy_handler)
        .with_state(app_state);

    let admin_router = Router::new()
        .route("/healthz", get(gatekeeper_admin::health::healthz))
        .route("/settings", get(gatekeeper_admin::settings::list_settings))
        .route("/settings/{key}", get(gatekeeper_admin::settings::get_setting))
        .with_state(config.clone());

    let app = proxy_router.merge(admin_router);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "gatekeeper listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("gatekeeper stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
