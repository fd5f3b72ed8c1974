// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite connection lifecycle: open, PRAGMAs, migrations, close.
//!
//! One tokio-rusqlite connection serves the whole process; its background
//! thread is the single writer. Opening a second [`Connection`] for writes
//! would defeat that serialization.

use switchboard_core::SwitchboardError;
use tokio_rusqlite::Connection;
use tracing::debug;

/// Handle to the SQLite database.
///
/// Cloning is cheap; every clone talks to the same background connection
/// thread. Migrations run once inside [`open`](Database::open).
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path` with WAL mode enabled.
    pub async fn open(path: &str) -> Result<Self, SwitchboardError> {
        Self::open_with(path, true).await
    }

    /// Open (or create) the database at `path`.
    ///
    /// Applies connection PRAGMAs, then runs all pending migrations.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, SwitchboardError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| SwitchboardError::Store {
                source: Box::new(e),
            })?;
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| map_tr_err(e.into()))?;

        conn.call(move |conn| {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", true)?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(crate::migrations::run_migrations(conn))
        })
        .await
        .map_err(map_tr_err)??;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection handle.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL and shut down the connection thread.
    pub async fn close(self) -> Result<(), SwitchboardError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(map_tr_err)?;
        Ok(())
    }
}

/// Convert a tokio-rusqlite error into the store error class.
///
/// Every failure here means the store itself misbehaved; "no rows" is
/// handled inside the query modules and never reaches this function.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> SwitchboardError {
    SwitchboardError::Store {
        source: Box::new(e),
    }
}

/// Parse a TEXT column into a typed value inside a rusqlite row closure.
///
/// Used for the state and enum columns, which are stored as their
/// lowercase string encodings.
pub(crate) fn parse_text_col<T>(idx: usize, raw: String) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
