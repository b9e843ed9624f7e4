//! shellcache server entry point.
//!
//! Installs the configured worker version, starts the HTTP proxy in front of
//! the app origin (unless disabled), and serves the MCP tools on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{FetchClient, FetchConfig, MemoryClients, MemoryNotifier, Platform, Registration, WorkerSettings};
use shellcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod proxy;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = config.origin_url()?;
    tracing::info!(origin = %origin, version = %config.version_tag, db = %config.db_path.display(), "starting shellcache");

    let db = CacheDb::open(&config.db_path).await?;
    let network = Arc::new(FetchClient::new(FetchConfig::from_app(&config))?);
    let platform = Platform::new(network, Arc::new(MemoryClients::new()), Arc::new(MemoryNotifier::new()));
    let registration = Arc::new(Registration::new(db.clone(), platform));

    // Without an active worker every request still reaches the network.
    let settings = WorkerSettings::from_config(&config)?;
    if let Err(e) = registration.register(settings, false).await {
        tracing::warn!(error = %e, "initial install failed; requests pass through until worker_update succeeds");
    }

    let state = state::AppState::new(config, origin, db, registration);

    if state.config.proxy_enabled {
        let listener = tokio::net::TcpListener::bind(&state.config.listen_addr).await?;
        tracing::info!(addr = %state.config.listen_addr, "proxy listening");
        let proxy_state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = proxy::serve(listener, proxy_state).await {
                tracing::error!(error = %e, "proxy stopped");
            }
        });
    }

    let handler = handler::ShellcacheServer::new(state.clone());
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    state.registration.settle().await;
    Ok(())
}
