// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQL for each entity family, one module per table group.

pub mod campaigns;
pub mod conversations;
pub mod messages;
