//! ==============================================================================
//! registry.rs - broadcast registry for open websocket connections
//! ==============================================================================
//!
//! purpose:
//!     tracks every open streaming connection and fans messages out to them.
//!     each connection is represented by the sending half of a bounded
//!     channel; the websocket task owns the receiving half and forwards to
//!     the socket.
//!
//! delivery model:
//!     best effort. a closed channel means the connection task is gone, so
//!     the member is evicted on the spot and the broadcast carries on. a
//!     full channel means the client is not keeping up: that one message is
//!     dropped for it and the member stays. the relay resends the latest
//!     state on its next tick anyway.
//!
//! relationships:
//!     - used by: relay.rs (sole broadcaster), api/ws.rs (register/unregister)
//!
//! ==============================================================================

use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// messages queued per connection before new ones are dropped for it
pub const CONNECTION_BUFFER: usize = 32;

#[derive(Default)]
pub struct BroadcastRegistry {
    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<String>>>,
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// add a connection; the caller forwards everything from the receiver
    pub async fn register(&self) -> (ConnectionId, mpsc::Receiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER);
        self.connections.write().await.insert(id, tx);
        tracing::info!(connection_id = %id, "client connected");
        (id, rx)
    }

    pub async fn unregister(&self, id: &ConnectionId) {
        if self.connections.write().await.remove(id).is_some() {
            tracing::info!(connection_id = %id, "client disconnected");
        }
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// serialize once and send to every member, dropping the ones that fail
    pub async fn broadcast<T: Serialize>(&self, message: &T) {
        let json = match serde_json::to_string(message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize broadcast");
                return;
            }
        };
        self.broadcast_text(json).await;
    }

    pub async fn broadcast_text(&self, text: String) {
        let mut connections = self.connections.write().await;
        connections.retain(|id, tx| match tx.try_send(text.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!(connection_id = %id, "client lagging, message dropped");
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(connection_id = %id, "evicting dead connection");
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_member() {
        let registry = BroadcastRegistry::new();
        let (_, mut a) = registry.register().await;
        let (_, mut b) = registry.register().await;

        registry.broadcast(&serde_json::json!({"n": 1})).await;

        assert_eq!(a.recv().await.unwrap(), r#"{"n":1}"#);
        assert_eq!(b.recv().await.unwrap(), r#"{"n":1}"#);
    }

    #[tokio::test]
    async fn failed_send_evicts_only_that_member() {
        let registry = BroadcastRegistry::new();
        let (_, _a) = registry.register().await;
        let (_, b) = registry.register().await;
        let (_, _c) = registry.register().await;
        assert_eq!(registry.len().await, 3);

        drop(b);
        registry.broadcast_text("tick".into()).await;

        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn stalled_client_queue_is_bounded() {
        let registry = BroadcastRegistry::new();
        let (_, mut stalled) = registry.register().await;
        let (_, mut live) = registry.register().await;

        for n in 0..1000 {
            registry.broadcast_text(n.to_string()).await;
            // the live client keeps draining
            assert_eq!(live.recv().await.unwrap(), n.to_string());
        }

        let mut queued = 0;
        while stalled.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, CONNECTION_BUFFER);
        assert_eq!(registry.len().await, 2);

        // a drained client picks up again on the next broadcast
        registry.broadcast_text("next".into()).await;
        assert_eq!(stalled.recv().await.unwrap(), "next");
    }

    #[tokio::test]
    async fn unregister_removes_member() {
        let registry = BroadcastRegistry::new();
        let (id, _rx) = registry.register().await;
        registry.unregister(&id).await;
        assert!(registry.is_empty().await);
        // second unregister is harmless
        registry.unregister(&id).await;
    }
}
