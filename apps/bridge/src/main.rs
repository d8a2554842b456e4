//! `wootrico-bridge`: the bridge's single binary. Runs the HTTP ingress
//! and both reconciliation processors as independent tokio tasks sharing
//! one `AppState`, plus a periodic wipe of the credit ledger and mapping
//! cache so neither grows unbounded across a long-lived process.

mod http;
mod inbound;
mod outbound;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bridge_queue::BridgeQueue;
use bridge_tenants::TenantRegistry;
use state::AppState;

const WIPE_INTERVAL: Duration = Duration::from_secs(5 * 60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    bridge_telemetry::init_logging(&bridge_telemetry::LoggingConfig::from_env("wootrico-bridge"));

    let (registry, report) = TenantRegistry::load().map_err(|err| anyhow::anyhow!(err))?;
    for (tenant_id, reason) in &report.failures {
        tracing::warn!(tenant_id, reason, "tenant failed to load, skipping");
    }
    tracing::info!(tenants = registry.iter().count(), "tenant registry loaded");

    let nats_url = std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".into());
    let queue = BridgeQueue::connect(&nats_url).await.with_context(|| format!("connect to NATS at {nats_url}"))?;

    let state = Arc::new(AppState::build(registry, queue.clone()).map_err(|err| anyhow::anyhow!(err))?);

    let nats = async_nats::connect(&nats_url).await.with_context(|| format!("connect to NATS at {nats_url}"))?;
    let inbound_dlq = bridge_dlq::DlqPublisher::new("processor-inbound", nats.clone()).await?;
    let outbound_dlq = bridge_dlq::DlqPublisher::new("processor-outbound", nats).await?;

    let wipe_state = state.clone();
    bridge_core::spawn_periodic(WIPE_INTERVAL, move || {
        wipe_state.ledger.clear();
        wipe_state.mapping.clear();
        tracing::info!("wiped credit ledger and mapping cache");
    });

    let inbound_state = state.clone();
    tokio::spawn(async move {
        inbound::run(queue.clone(), inbound_state, inbound_dlq).await;
    });

    let outbound_state = state.clone();
    let outbound_queue = state.queue.clone();
    tokio::spawn(async move {
        outbound::run(outbound_queue, outbound_state, outbound_dlq).await;
    });

    let bind: std::net::SocketAddr = std::env::var("BIND").unwrap_or_else(|_| "0.0.0.0:8080".into()).parse().context("parse BIND address")?;
    let listener = tokio::net::TcpListener::bind(bind).await.with_context(|| format!("bind {bind}"))?;
    tracing::info!(%bind, "wootrico-bridge listening");

    let app = http::router(state);
    axum::serve(listener, app.into_make_service()).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).expect("failed to install SIGTERM handler").recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
