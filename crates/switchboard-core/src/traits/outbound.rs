// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery seam.

use async_trait::async_trait;

use crate::error::SwitchboardError;

/// A transport that can push a message to a contact address.
///
/// Implementations wrap a provider API (WhatsApp, SMS) or, for the web
/// channel, the in-process push hub. The engine and the campaign
/// dispatcher only see this trait; a failed delivery affects exactly the
/// recipient it was addressed to.
#[async_trait]
pub trait OutboundChannel: Send + Sync + 'static {
    /// Short channel name used in logs (`"whatsapp"`, `"mock"`).
    fn name(&self) -> &str;

    /// Deliver `content` to `recipient_address`.
    ///
    /// Errors are recorded as [`DeliveryStatus::Failed`] on the message
    /// row and never abort the calling loop.
    ///
    /// [`DeliveryStatus::Failed`]: crate::types::DeliveryStatus::Failed
    async fn deliver(&self, recipient_address: &str, content: &str)
    -> Result<(), SwitchboardError>;
}
