// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Descriptions and recording helpers for every Switchboard metric.
//!
//! Everything goes through the metrics-rs facade, so the same call sites
//! feed Prometheus here and whatever recorder a test installs.

use metrics::{describe_counter, describe_gauge};

/// Describe every metric the workspace emits.
///
/// Runs once at startup, after the recorder is installed; descriptions
/// registered earlier would be dropped.
pub fn register_metrics() {
    describe_counter!(
        "switchboard_messages_total",
        "Messages appended to conversation logs"
    );
    describe_counter!(
        "switchboard_transitions_total",
        "Conversation state transitions applied"
    );
    describe_counter!(
        "switchboard_assignments_total",
        "Conversations assigned to agents"
    );
    describe_counter!(
        "switchboard_campaign_sends_total",
        "Campaign recipient sends attempted"
    );
    describe_counter!(
        "switchboard_queue_starvation_total",
        "Starvation sweep advisories per queue"
    );
    describe_gauge!(
        "switchboard_waiting_conversations",
        "Conversations parked on each queue's wait-list"
    );
    describe_gauge!(
        "switchboard_live_connections",
        "Open push subscriptions on the hub"
    );
}

/// Record a message appended to a conversation log.
pub fn record_message_appended(sender_kind: &str) {
    metrics::counter!("switchboard_messages_total", "sender_kind" => sender_kind.to_string())
        .increment(1);
}

/// Record an applied state transition.
pub fn record_transition(to_state: &str) {
    metrics::counter!("switchboard_transitions_total", "to" => to_state.to_string()).increment(1);
}

/// Record a successful queue assignment.
pub fn record_assignment(queue_id: &str) {
    metrics::counter!("switchboard_assignments_total", "queue" => queue_id.to_string())
        .increment(1);
}

/// Record one campaign send attempt with its outcome.
pub fn record_campaign_send(status: &str) {
    metrics::counter!("switchboard_campaign_sends_total", "status" => status.to_string())
        .increment(1);
}

/// Record a starvation advisory for a queue.
pub fn record_starvation(queue_id: &str) {
    metrics::counter!("switchboard_queue_starvation_total", "queue" => queue_id.to_string())
        .increment(1);
}

/// Set the wait-list depth for a queue.
pub fn set_waiting_conversations(queue_id: &str, count: f64) {
    metrics::gauge!("switchboard_waiting_conversations", "queue" => queue_id.to_string())
        .set(count);
}

/// Set the number of open push subscriptions.
pub fn set_live_connections(count: f64) {
    metrics::gauge!("switchboard_live_connections").set(count);
}
