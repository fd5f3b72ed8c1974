// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection registry and fan-out.

use std::collections::HashSet;
use std::time::Duration;

use dashmap::DashMap;
use switchboard_core::ConnectionRole;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::event::ConversationEvent;

/// Size of the per-connection send buffer.
///
/// A connection that falls this many events behind starts losing pushes;
/// catch-up via the store recovers them.
pub const CONNECTION_BUFFER_SIZE: usize = 64;

struct ConnectionHandle {
    conversation_id: String,
    role: ConnectionRole,
    sender: mpsc::Sender<ConversationEvent>,
    last_seen: Instant,
    /// Highest seq pushed or acked on this connection. Advanced
    /// optimistically on successful `try_send`; an ack can only move it
    /// forward.
    last_seen_seq: i64,
}

/// Fan-out hub for live push subscriptions.
///
/// Connections are keyed by a caller-chosen `connection_id`; each belongs
/// to exactly one conversation. Publishing never awaits and never blocks
/// on a slow consumer: full buffers are skipped and the event is simply
/// dropped for that connection.
pub struct PushHub {
    connections: DashMap<String, ConnectionHandle>,
    by_conversation: DashMap<String, HashSet<String>>,
}

impl PushHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            by_conversation: DashMap::new(),
        }
    }

    /// Register a push subscription for one conversation.
    ///
    /// Returns the receiver end of the connection's bounded buffer. A
    /// second subscribe under the same `connection_id` replaces the
    /// first; the previous receiver observes its channel closing.
    pub fn subscribe(
        &self,
        conversation_id: &str,
        connection_id: &str,
        role: ConnectionRole,
    ) -> mpsc::Receiver<ConversationEvent> {
        // Drop any previous registration under this id first, so a
        // reconnect can never leave a ghost entry on another conversation.
        self.remove_connection(connection_id);

        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER_SIZE);
        self.connections.insert(
            connection_id.to_string(),
            ConnectionHandle {
                conversation_id: conversation_id.to_string(),
                role,
                sender: tx,
                last_seen: Instant::now(),
                last_seen_seq: 0,
            },
        );
        self.by_conversation
            .entry(conversation_id.to_string())
            .or_default()
            .insert(connection_id.to_string());

        debug!(conversation_id, connection_id, role = %role, "push subscription opened");
        rx
    }

    /// Drop a connection and its conversation-index entry.
    pub fn unsubscribe(&self, connection_id: &str) {
        if self.remove_connection(connection_id) {
            debug!(connection_id, "push subscription closed");
        }
    }

    /// Fan an event out to every live connection on the conversation.
    ///
    /// Non-blocking: a full or closed buffer is skipped, at-most-once.
    /// Returns how many connections accepted the event.
    pub fn publish(&self, conversation_id: &str, event: &ConversationEvent) -> usize {
        let subscriber_ids: Vec<String> = match self.by_conversation.get(conversation_id) {
            Some(ids) => ids.iter().cloned().collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for connection_id in subscriber_ids {
            let Some(mut handle) = self.connections.get_mut(&connection_id) else {
                continue;
            };
            match handle.sender.try_send(event.clone()) {
                Ok(()) => {
                    handle.last_seen_seq = handle.last_seen_seq.max(event.seq());
                    delivered += 1;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        conversation_id,
                        connection_id,
                        seq = event.seq(),
                        "push buffer full, event dropped for slow connection"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(connection_id, "push send to closed connection skipped");
                }
            }
        }
        delivered
    }

    /// Refresh a connection's liveness mark. Returns false for unknown ids.
    pub fn heartbeat(&self, connection_id: &str) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(mut handle) => {
                handle.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Record a client-confirmed delivery cursor.
    ///
    /// The cursor never moves backwards; an ack also counts as liveness.
    pub fn ack(&self, connection_id: &str, seq: i64) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(mut handle) => {
                handle.last_seen = Instant::now();
                handle.last_seen_seq = handle.last_seen_seq.max(seq);
                true
            }
            None => false,
        }
    }

    /// Unsubscribe every connection silent for longer than `timeout`.
    ///
    /// Returns the pruned connection ids.
    pub fn prune_stale(&self, timeout: Duration) -> Vec<String> {
        let now = Instant::now();
        let stale: Vec<(String, String, ConnectionRole)> = self
            .connections
            .iter()
            .filter(|entry| now.duration_since(entry.last_seen) > timeout)
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.conversation_id.clone(),
                    entry.role,
                )
            })
            .collect();

        let mut pruned = Vec::with_capacity(stale.len());
        for (connection_id, conversation_id, role) in stale {
            self.remove_connection(&connection_id);
            info!(
                connection_id,
                conversation_id,
                role = %role,
                "pruned stale push connection"
            );
            pruned.push(connection_id);
        }
        pruned
    }

    /// Number of live connections across all conversations.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of live connections on one conversation.
    pub fn subscriber_count(&self, conversation_id: &str) -> usize {
        self.by_conversation
            .get(conversation_id)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    /// The optimistic delivery cursor for a connection.
    pub fn delivery_cursor(&self, connection_id: &str) -> Option<i64> {
        self.connections
            .get(connection_id)
            .map(|handle| handle.last_seen_seq)
    }

    fn remove_connection(&self, connection_id: &str) -> bool {
        let Some((_, handle)) = self.connections.remove(connection_id) else {
            return false;
        };
        if let Some(mut ids) = self.by_conversation.get_mut(&handle.conversation_id) {
            ids.remove(connection_id);
        }
        self.by_conversation
            .remove_if(&handle.conversation_id, |_, ids| ids.is_empty());
        true
    }
}

impl Default for PushHub {
    fn default() -> Self {
        Self::new()
    }
}
