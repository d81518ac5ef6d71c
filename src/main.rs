//! ==============================================================================
//! main.rs - lablink gateway entry point
//! ==============================================================================
//!
//! purpose:
//!     the single process between the sensor device, the hosted datastore
//!     and the dashboards.
//!
//! responsibilities:
//!     - load configuration (gateway.toml + environment)
//!     - pick the datastore backend (hosted rest api, or in-memory for offline work)
//!     - serve the rest api and the websocket stream
//!     - own the polling relay that pushes live readings
//!     - shut down cleanly on ctrl-c / sigterm
//!
//! architecture:
//!
//!     ┌──────────┐  POST /readings   ┌──────────────────────────────────┐
//!     │  esp32   │ ────────────────▶ │          gateway (this)          │
//!     └──────────┘                   │  ┌──────────┐   ┌─────────────┐  │
//!                                    │  │ handlers │   │ poll relay  │  │
//!     ┌──────────┐   GET /ws         │  └────┬─────┘   └──┬───────┬──┘  │
//!     │dashboard │ ◀──────────────── │       │            │       │     │
//!     └──────────┘   sensor_update   │       │   ┌────────┴──┐    │     │
//!                                    │       │   │ registry  │◀───┘     │
//!                                    │       ▼   └───────────┘          │
//!                                    │  ┌──────────────┐                │
//!                                    │  │ remote store │◀── relay reads │
//!                                    │  └──────┬───────┘                │
//!                                    └─────────┼────────────────────────┘
//!                                              ▼ rest
//!                                       hosted datastore
//!
//! ==============================================================================

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lablink_gateway::api::{build_router, AppState};
use lablink_gateway::config::GatewayConfig;
use lablink_gateway::store::{MemoryStore, RemoteStore, RestStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // step 1: load configuration (before tracing: the log level lives in it)
    let mut config = GatewayConfig::load_or_default();
    config.apply_env();
    config.validate()?;

    // step 2: logging
    let default_filter = format!(
        "lablink_gateway={level},tower_http={level}",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting lablink gateway v{}", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    // step 3: datastore backend
    let remote: Arc<dyn RemoteStore> = if config.store.url.starts_with("memory:") {
        tracing::warn!("using in-memory store - nothing will be persisted");
        Arc::new(MemoryStore::new())
    } else {
        if config.store.service_key.is_empty() {
            tracing::warn!("SUPABASE_SERVICE_ROLE_KEY is not set - store calls will be rejected");
        }
        Arc::new(RestStore::new(&config.store)?)
    };

    // step 4: shared state (registry + relay are created once, here)
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let autostart = config.relay.autostart;
    let state = AppState::new(remote, config);

    if autostart {
        state.relay.start().await;
    }

    // step 5: serve until a shutdown signal
    let relay = state.relay.clone();
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("gateway listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = relay.stop().await {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "relay task did not exit cleanly");
        }
    }
    tracing::info!("gateway shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(i), Ok(t)) => (i, t),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "failed to install signal handlers");
            std::future::pending::<()>().await;
            return;
        }
    };
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
