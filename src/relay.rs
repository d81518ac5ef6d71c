//! ==============================================================================
//! relay.rs - polling relay from the datastore to websocket clients
//! ==============================================================================
//!
//! purpose:
//!     while an experiment is running, repeatedly fetch the newest reading
//!     from the store and push it to every open websocket.
//!
//! states:
//!
//!     stopped ──start()──▶ running ──stop()──▶ stopped
//!                            │
//!               ┌────────────┴────────────┐
//!               ▼                         ▼
//!        idle (no clients)        active (≥1 client)
//!        sleep idle interval      query latest → broadcast
//!        never queries store      sleep active interval (10 Hz)
//!
//!     start() on a running relay is a no-op. stop() cancels the loop and
//!     hands back its join handle; the loop wakes from its sleep at once. a
//!     store call already in flight is left to finish and its result is
//!     thrown away.
//!
//!     store errors are logged and the tick is skipped. nothing is ever
//!     synthesized when the store has no rows.
//!
//! relationships:
//!     - uses: store.rs (latest reading), registry.rs (fan-out)
//!     - used by: api/handlers.rs (experiment start/stop), main.rs (autostart)
//!
//! ==============================================================================

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::domain::{SensorUpdate, StreamMessage};
use crate::registry::BroadcastRegistry;
use crate::store::SensorStore;

/// what a single relay tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// no clients connected, store untouched
    Idle,
    /// store had no rows
    Empty,
    Broadcast,
    /// store call failed, logged and skipped
    Skipped,
    /// stop was requested while the store call was in flight
    Cancelled,
}

struct Running {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// control object for the background relay task
pub struct PollingRelay {
    store: SensorStore,
    registry: Arc<BroadcastRegistry>,
    config: RelayConfig,
    running: Mutex<Option<Running>>,
}

impl PollingRelay {
    pub fn new(store: SensorStore, registry: Arc<BroadcastRegistry>, config: RelayConfig) -> Self {
        Self { store, registry, config, running: Mutex::new(None) }
    }

    /// spawn the loop; returns false if it was already running
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            tracing::debug!("relay already running");
            return false;
        }

        let token = CancellationToken::new();
        let task = tokio::spawn(run(
            self.store.clone(),
            self.registry.clone(),
            self.config.clone(),
            token.clone(),
        ));
        *running = Some(Running { token, task });
        true
    }

    /// request cancellation; `None` if nothing was running
    ///
    /// the returned handle resolves once the loop has actually exited.
    pub async fn stop(&self) -> Option<JoinHandle<()>> {
        let running = self.running.lock().await.take()?;
        running.token.cancel();
        Some(running.task)
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }
}

async fn run(
    store: SensorStore,
    registry: Arc<BroadcastRegistry>,
    config: RelayConfig,
    token: CancellationToken,
) {
    tracing::info!(
        active_ms = config.active_interval_ms,
        idle_ms = config.idle_interval_ms,
        "relay started"
    );

    loop {
        let pause = match tick(&store, &registry, &token).await {
            Tick::Idle => config.idle_interval(),
            Tick::Cancelled => break,
            _ => config.active_interval(),
        };

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    tracing::info!("relay stopped");
}

/// one iteration: check for listeners, fetch the newest row, fan it out
pub async fn tick(store: &SensorStore, registry: &BroadcastRegistry, token: &CancellationToken) -> Tick {
    if registry.is_empty().await {
        return Tick::Idle;
    }

    let latest = store.latest_reading(None).await;
    if token.is_cancelled() {
        return Tick::Cancelled;
    }

    match latest {
        Ok(Some(reading)) => {
            let message = StreamMessage::SensorUpdate(SensorUpdate::from(&reading));
            registry.broadcast(&message).await;
            Tick::Broadcast
        }
        Ok(None) => Tick::Empty,
        Err(e) => {
            tracing::warn!(error = %e, "relay tick skipped");
            Tick::Skipped
        }
    }
}
