// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics surface for Switchboard.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Metrics are
//! rendered as Prometheus text format via [`PrometheusExporter::render`],
//! which the gateway exposes on its `/metrics` endpoint. All recording
//! helpers are no-ops until a recorder is installed, so library code can
//! call them unconditionally.

pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use switchboard_core::SwitchboardError;

pub use recording::{
    record_assignment, record_campaign_send, record_message_appended, record_starvation,
    record_transition, set_live_connections, set_waiting_conversations,
};

/// Holds the installed Prometheus recorder's render handle.
pub struct PrometheusExporter {
    handle: PrometheusHandle,
}

impl PrometheusExporter {
    /// Install the Prometheus recorder globally and register metric
    /// descriptions.
    ///
    /// Only one recorder can be installed per process; a second call
    /// returns an error.
    pub fn install() -> Result<Self, SwitchboardError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            SwitchboardError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus recorder installed");

        Ok(Self { handle })
    }

    /// The render handle, for callers that outlive the exporter struct.
    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Everything recorded so far, in Prometheus exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
