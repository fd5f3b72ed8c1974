// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types the queries read and write.
//!
//! The canonical definitions live in `switchboard-core::types` and are
//! shared across crate boundaries; this module re-exports them for use
//! inside the storage crate and adds the timestamp helper all rows use.

pub use switchboard_core::types::{
    Campaign, CampaignRecipient, CampaignStatus, ChannelKind, Conversation, DeliveryStatus,
    Message, NewMessage, SenderKind,
};

/// Current UTC time in the millisecond RFC3339 form every row stores,
/// e.g. `2026-01-01T00:00:00.000Z`. Matches SQLite's
/// `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')` so Rust-side and SQL-side
/// timestamps sort together lexicographically.
pub fn now_rfc3339() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_has_millis_and_zulu_suffix() {
        let ts = now_rfc3339();
        assert!(ts.ends_with('Z'), "timestamp should be UTC: {ts}");
        // YYYY-MM-DDTHH:MM:SS.mmmZ
        assert_eq!(ts.len(), 24, "unexpected timestamp shape: {ts}");
    }
}
