// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-writer discipline for the store.
//!
//! `Database` wraps one `tokio_rusqlite::Connection`; every query module
//! takes `&Database` and runs its closure on that connection's background
//! thread, so all writes are serialized whatever the caller concurrency.
//!
//! **Do NOT open additional write connections.**

// What the serialization buys:
// - no SQLITE_BUSY under concurrent engine / campaign / gateway writes
// - seq allocation (the next_seq UPDATE and the message INSERT share one
//   transaction on one thread) stays gapless per conversation
// - conversation state CAS reads and writes cannot interleave
