// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema migrations, embedded with refinery.
//!
//! `embed_migrations!` bakes the SQL files under `migrations/` into the
//! binary; [`Database::open`](crate::Database::open) applies any that have
//! not run yet, so a deployed node upgrades its schema on startup.

use switchboard_core::SwitchboardError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply whatever migrations the connection's schema is missing.
///
/// Refinery keeps its bookkeeping in `refinery_schema_history`, so reruns
/// are no-ops.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), SwitchboardError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| SwitchboardError::Store {
            source: Box::new(e),
        })?;
    Ok(())
}
