//! Realtime push channels for the OmniBiz backend
//!
//! Domain events (wallet updated, message received, payment callbacks) are
//! pushed to the owning user's private channel. Delivery is fire-and-forget:
//! the originating request never blocks on it and a failed push never fails
//! the operation that produced the event.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Registry of connected clients, keyed by user id. A user may hold several
/// simultaneous connections (phone + browser).
#[derive(Clone)]
pub struct WsState {
    clients: Arc<RwLock<HashMap<Uuid, Vec<mpsc::UnboundedSender<String>>>>>,
}

impl WsState {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn register(&self, user_id: Uuid) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.write().await.entry(user_id).or_default().push(tx);
        rx
    }

    /// Push an event to every connection of one user. Closed channels are
    /// pruned on the way through.
    pub async fn send_to_user<E: Serialize>(&self, user_id: Uuid, event: &E) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "failed to serialize realtime event");
                return;
            }
        };

        let mut clients = self.clients.write().await;
        if let Some(senders) = clients.get_mut(&user_id) {
            senders.retain(|tx| tx.send(payload.clone()).is_ok());
            if senders.is_empty() {
                clients.remove(&user_id);
            }
        }
    }

    /// Push an event to every connected client
    pub async fn broadcast<E: Serialize>(&self, event: &E) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize broadcast event");
                return;
            }
        };

        let mut clients = self.clients.write().await;
        clients.retain(|_, senders| {
            senders.retain(|tx| tx.send(payload.clone()).is_ok());
            !senders.is_empty()
        });
    }

    /// Number of users with at least one open connection
    pub async fn connected_users(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Default for WsState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub user_id: Uuid,
}

/// Upgrade handler for `GET /ws?user_id=<uuid>`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(ws_state): State<WsState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, query.user_id, ws_state))
}

async fn handle_socket(socket: WebSocket, user_id: Uuid, ws_state: WsState) {
    let (mut sink, mut stream) = socket.split();
    let mut events = ws_state.register(user_id).await;
    tracing::info!(%user_id, "websocket connected");

    loop {
        tokio::select! {
            outgoing = events.recv() => {
                match outgoing {
                    Some(payload) => {
                        if sink.send(WsMessage::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    // Clients only listen on this channel; inbound frames
                    // other than close are ignored.
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::info!(%user_id, "websocket disconnected");
}
