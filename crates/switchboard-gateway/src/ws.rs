// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket push subscriptions.
//!
//! Server -> client frames are serialized [`ConversationEvent`]s:
//! ```json
//! {"conversation_id": "...", "state": "waiting", "message": {...}}
//! ```
//!
//! Client -> server frames keep the connection alive and advance the
//! delivery cursor:
//! ```json
//! {"type": "heartbeat"}
//! {"type": "ack", "seq": 42}
//! ```
//!
//! Push is at-most-once; a client that misses frames (buffer overflow,
//! reconnect) recovers through the catch-up route using its last acked
//! seq.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use switchboard_core::{ConnectionRole, SwitchboardError};
use switchboard_metrics as metrics;

use crate::auth::bearer_from_headers;
use crate::error::ApiError;
use crate::server::GatewayState;

/// Query params for GET /ws.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Conversation to subscribe to.
    pub conversation_id: String,
    /// Caller-chosen connection id; one is generated when absent.
    /// Reusing an id replaces the previous subscription, which is how
    /// reconnects avoid ghost entries.
    #[serde(default)]
    pub connection_id: Option<String>,
    /// Subscription role; defaults to `contact`.
    #[serde(default)]
    pub role: Option<ConnectionRole>,
    /// Bearer token equivalent for browser clients, which cannot set
    /// headers on a websocket handshake.
    #[serde(default)]
    pub token: Option<String>,
}

/// Client -> server control frame.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientFrame {
    /// Liveness keepalive; silent connections get pruned.
    Heartbeat,
    /// Confirms delivery up to `seq`. The cursor never moves backwards.
    Ack { seq: i64 },
}

/// GET /ws: authenticate, then upgrade.
///
/// Token comes from the Authorization header when the client can set one,
/// or the `token` query param as the browser fallback. Unknown
/// conversations are rejected before the upgrade, while we can still
/// return a proper status code.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    State(state): State<GatewayState>,
) -> Response {
    let presented = bearer_from_headers(&headers).or(query.token.as_deref());
    if !state.auth.allows(presented) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match state.store.get_conversation(&query.conversation_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return ApiError(SwitchboardError::NotFound {
                kind: "conversation",
                id: query.conversation_id,
            })
            .into_response();
        }
        Err(e) => return ApiError(e).into_response(),
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, query))
}

/// Drive one websocket connection until either side hangs up.
///
/// A spawned sender task forwards hub events to the client; the receiver
/// loop handles heartbeat/ack control frames.
async fn handle_socket(socket: WebSocket, state: GatewayState, query: WsQuery) {
    let connection_id = query
        .connection_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let role = query.role.unwrap_or(ConnectionRole::Contact);

    let mut events = state
        .hub
        .subscribe(&query.conversation_id, &connection_id, role);
    metrics::set_live_connections(state.hub.connection_count() as f64);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Forward published events to the client as JSON text frames.
    let sender_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, "event serialization failed");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let text_str: &str = &text;
                let frame: ClientFrame = match serde_json::from_str(text_str) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(connection_id, "invalid websocket frame: {e}");
                        continue;
                    }
                };
                match frame {
                    ClientFrame::Heartbeat => {
                        state.hub.heartbeat(&connection_id);
                    }
                    ClientFrame::Ack { seq } => {
                        state.hub.ack(&connection_id, seq);
                    }
                }
            }
            Message::Close(_) => break,
            _ => {} // Ignore binary; ping/pong handled by the tungstenite layer.
        }
    }

    state.hub.unsubscribe(&connection_id);
    sender_task.abort();
    metrics::set_live_connections(state.hub.connection_count() as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frame_parses_heartbeat() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type": "heartbeat"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Heartbeat));
    }

    #[test]
    fn client_frame_parses_ack_with_seq() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type": "ack", "seq": 42}"#).unwrap();
        match frame {
            ClientFrame::Ack { seq } => assert_eq!(seq, 42),
            other => panic!("expected ack frame, got {other:?}"),
        }
    }

    #[test]
    fn client_frame_rejects_unknown_types() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type": "typing"}"#).is_err());
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type": "ack"}"#).is_err());
        assert!(serde_json::from_str::<ClientFrame>("not json").is_err());
    }

    #[test]
    fn ws_query_role_parses_lowercase() {
        let query: WsQuery = serde_json::from_str(
            r#"{"conversation_id": "c1", "role": "agent", "connection_id": "conn-7"}"#,
        )
        .unwrap();
        assert_eq!(query.role, Some(ConnectionRole::Agent));
        assert_eq!(query.connection_id.as_deref(), Some("conn-7"));
        assert!(query.token.is_none());
    }
}
