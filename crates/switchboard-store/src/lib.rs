// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Switchboard conversation engine.
//!
//! WAL-mode SQLite behind `tokio-rusqlite`'s single writer thread, refinery
//! migrations baked into the binary, and typed query modules covering
//! conversations, their append-only message logs, and campaigns. Sequence
//! numbers are allocated transactionally so each conversation's log is
//! gapless and strictly increasing.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod store;
pub mod writer;

pub use database::Database;
pub use models::*;
pub use store::SqliteStore;
