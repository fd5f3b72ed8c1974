// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock outbound channel adapter for deterministic testing.
//!
//! `MockOutbound` implements `OutboundChannel` with captured deliveries
//! and per-address injectable failures for assertion in tests.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use switchboard_core::{OutboundChannel, SwitchboardError};

/// A capturing outbound adapter.
///
/// Successful deliveries land in an ordered capture list; addresses
/// marked failing reject with a channel error until healed, which is how
/// tests exercise per-recipient failure paths.
pub struct MockOutbound {
    delivered: Mutex<Vec<(String, String)>>,
    failing: Mutex<HashSet<String>>,
}

impl MockOutbound {
    /// Create a mock with empty capture state.
    pub fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Make deliveries to `address` fail until [`heal_address`] is called.
    ///
    /// [`heal_address`]: MockOutbound::heal_address
    pub async fn fail_address(&self, address: &str) {
        self.failing.lock().await.insert(address.to_string());
    }

    /// Let deliveries to `address` succeed again.
    pub async fn heal_address(&self, address: &str) {
        self.failing.lock().await.remove(address);
    }

    /// All successful deliveries as `(address, content)` pairs, in order.
    pub async fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.lock().await.clone()
    }

    /// Contents successfully delivered to one address, in order.
    pub async fn delivered_to(&self, address: &str) -> Vec<String> {
        self.delivered
            .lock()
            .await
            .iter()
            .filter(|(a, _)| a == address)
            .map(|(_, content)| content.clone())
            .collect()
    }

    /// Count of successful deliveries.
    pub async fn delivered_count(&self) -> usize {
        self.delivered.lock().await.len()
    }

    /// Drop all captured deliveries.
    pub async fn clear(&self) {
        self.delivered.lock().await.clear();
    }
}

impl Default for MockOutbound {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutboundChannel for MockOutbound {
    fn name(&self) -> &str {
        "mock"
    }

    async fn deliver(&self, recipient_address: &str, content: &str) -> Result<(), SwitchboardError> {
        if self.failing.lock().await.contains(recipient_address) {
            return Err(SwitchboardError::Channel {
                message: format!("mock delivery to {recipient_address} refused"),
                source: None,
            });
        }
        self.delivered
            .lock()
            .await
            .push((recipient_address.to_string(), content.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deliver_captures_in_order() {
        let mock = MockOutbound::new();
        mock.deliver("+5511901", "first").await.unwrap();
        mock.deliver("+5511902", "second").await.unwrap();
        mock.deliver("+5511901", "third").await.unwrap();

        assert_eq!(mock.delivered_count().await, 3);
        assert_eq!(
            mock.delivered_to("+5511901").await,
            vec!["first".to_string(), "third".to_string()]
        );
    }

    #[tokio::test]
    async fn failing_address_rejects_until_healed() {
        let mock = MockOutbound::new();
        mock.fail_address("+5511901").await;

        let err = mock.deliver("+5511901", "oi").await.unwrap_err();
        assert!(matches!(err, SwitchboardError::Channel { .. }));
        assert_eq!(mock.delivered_count().await, 0);

        // Other addresses are unaffected.
        mock.deliver("+5511902", "oi").await.unwrap();

        mock.heal_address("+5511901").await;
        mock.deliver("+5511901", "oi").await.unwrap();
        assert_eq!(mock.delivered_count().await, 2);
    }

    #[tokio::test]
    async fn clear_resets_captures() {
        let mock = MockOutbound::new();
        mock.deliver("a", "x").await.unwrap();
        mock.clear().await;
        assert_eq!(mock.delivered_count().await, 0);
        assert!(mock.delivered().await.is_empty());
    }
}
