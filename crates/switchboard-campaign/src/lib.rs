// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bulk message campaigns for the Switchboard conversation engine.
//!
//! A campaign freezes a recipient snapshot at creation and dispatches the
//! template to each recipient at a bounded rate, through the same engine
//! path as live messages. The persisted cursor makes pause/resume and
//! process restarts exact: each remaining recipient is sent to exactly
//! once, and failures are per-recipient, never per-run.

mod dispatch;
pub mod manager;

pub use manager::{CampaignManager, CampaignReport, CampaignSpec};
