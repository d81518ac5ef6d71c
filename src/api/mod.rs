//! ==============================================================================
//! api - http and websocket surface
//! ==============================================================================
//!
//! purpose:
//!     wires every route onto one axum router sharing a cloneable `AppState`.
//!
//! routes:
//!     GET  /                              service info
//!     GET  /health                        liveness
//!     POST /readings, /api/sensor-data    ingest one reading
//!     GET  /api/sensor-data               recent readings (newest first)
//!     GET  /api/sensor-data/latest        newest reading or null
//!     POST /sessions/start, /sessions/stop
//!     POST /api/experiment/start|stop     toggle the polling relay
//!     POST /api/experiment/summary        summary over the recent window
//!     POST /api/experiment/summary-no-data
//!     GET  /api/export/csv                csv download
//!     POST /auth/v1/token, /auth/v1/signup
//!     GET  /ws                            live sensor stream
//!
//! ==============================================================================

mod handlers;
mod ws;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::registry::BroadcastRegistry;
use crate::relay::PollingRelay;
use crate::store::{RemoteStore, SensorStore};

/// everything a handler can reach; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub store: SensorStore,
    pub registry: Arc<BroadcastRegistry>,
    pub relay: Arc<PollingRelay>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(remote: Arc<dyn RemoteStore>, config: GatewayConfig) -> Self {
        let store = SensorStore::new(remote, &config.store);
        let registry = Arc::new(BroadcastRegistry::new());
        let relay = Arc::new(PollingRelay::new(
            store.clone(),
            registry.clone(),
            config.relay.clone(),
        ));
        Self { store, registry, relay, config: Arc::new(config) }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::service_info))
        .route("/health", get(handlers::health))
        .route("/readings", post(handlers::ingest_reading))
        .route(
            "/api/sensor-data",
            get(handlers::recent_readings).post(handlers::ingest_reading),
        )
        .route("/api/sensor-data/latest", get(handlers::latest_reading))
        .route("/sessions/start", post(handlers::start_session))
        .route("/sessions/stop", post(handlers::stop_session))
        .route("/api/experiment/start", post(handlers::start_experiment))
        .route("/api/experiment/stop", post(handlers::stop_experiment))
        .route("/api/experiment/summary", post(handlers::experiment_summary))
        .route("/api/experiment/summary-no-data", post(handlers::no_data_summary))
        .route("/api/export/csv", get(handlers::export_csv))
        .route("/auth/v1/token", post(handlers::sign_in))
        .route("/auth/v1/signup", post(handlers::sign_up))
        .route("/ws", get(ws::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
