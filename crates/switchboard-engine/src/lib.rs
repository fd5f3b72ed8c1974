// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state machine, queue assignment, and sweepers.
//!
//! The engine owns every conversation transition: it appends messages,
//! escalates bot conversations to human queues, assigns agents under
//! per-queue slot budgets, and replays history for reconnecting clients.
//! All mutation of one conversation runs behind that conversation's
//! async lock; queue accounting lives on an in-memory board rebuilt from
//! the store at startup.

pub mod engine;
pub mod locks;
pub mod queue_board;

pub use engine::{ConversationEngine, IngestOutcome};
pub use locks::ConversationLocks;
pub use queue_board::{AgentOccupancy, AssignOutcome, QueueBoard, QueueOccupancy, StarvingQueue};
