use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::AppState;
use crate::domain::{SensorUpdate, StreamMessage};
use crate::error::Result;
use crate::registry::CONNECTION_BUFFER;
use crate::store::SensorStore;

/// samples replayed to a client when it connects
pub const INITIAL_SAMPLES: usize = 10;

/// websocket upgrade handler
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// newest samples across all sessions, oldest first
pub async fn initial_data(store: &SensorStore) -> Result<StreamMessage> {
    let recent = store.recent_readings(None, INITIAL_SAMPLES).await?;
    Ok(StreamMessage::InitialData(recent.iter().rev().map(SensorUpdate::from).collect()))
}

async fn initial_json(store: &SensorStore) -> Result<String> {
    Ok(serde_json::to_string(&initial_data(store).await?)?)
}

/// joins the registry for the lifetime of the socket
async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (conn_id, mut broadcasts) = state.registry.register().await;
    let (echo_tx, mut echoes) = mpsc::channel::<String>(CONNECTION_BUFFER);

    // history goes out before anything queued by the relay since registering
    match initial_json(&state.store).await {
        Ok(json) => {
            if sender.send(Message::Text(json)).await.is_err() {
                state.registry.unregister(&conn_id).await;
                return;
            }
        }
        Err(e) => tracing::warn!(connection_id = %conn_id, error = %e, "initial data skipped"),
    }

    // registry broadcasts and echoes share the one sink
    let mut send_task = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                Some(text) = broadcasts.recv() => text,
                Some(text) = echoes.recv() => text,
                else => break,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    match serde_json::to_string(&StreamMessage::Echo(text)) {
                        Ok(json) => {
                            if echo_tx.send(json).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(connection_id = %conn_id, error = %e, "echo failed"),
                    }
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::warn!(connection_id = %conn_id, error = %e, "websocket error");
                    break;
                }
                // pings are answered by axum
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.registry.unregister(&conn_id).await;
}
