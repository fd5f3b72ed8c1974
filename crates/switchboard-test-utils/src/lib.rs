// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Switchboard integration tests.
//!
//! Provides [`TestHarness`] for assembling a full conversation stack
//! over a temp database, and [`MockOutbound`] for capturing outbound
//! deliveries with injectable failures.

pub mod harness;
pub mod mock_outbound;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_outbound::MockOutbound;
