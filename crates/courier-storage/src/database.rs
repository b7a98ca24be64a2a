// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. `Database` wraps the one `tokio_rusqlite::Connection` the ledgers
//! write through; query modules take `&Database` and call `conn().call()`.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;
use std::time::Duration;

use courier_core::CourierError;
use tracing::debug;

use crate::migrations;

/// How long a reader waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Convert a tokio-rusqlite error into `CourierError::Storage`.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> CourierError {
    CourierError::storage(e)
}

/// Handle to the ledger database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` in WAL mode and migrate it.
    pub async fn open(path: &str) -> Result<Self, CourierError> {
        Self::open_with(path, true).await
    }

    /// Open the database, choosing the journal mode explicitly.
    ///
    /// Migrations run on a short-lived blocking connection before the
    /// single writer connection is opened.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, CourierError> {
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), CourierError> {
            if let Some(parent) = Path::new(&migrate_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(CourierError::storage)?;
                }
            }
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(CourierError::storage)?;
            if wal_mode {
                let mode: String = conn
                    .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
                    .map_err(CourierError::storage)?;
                debug!(journal_mode = %mode, "journal mode set");
            }
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| CourierError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(CourierError::storage)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "ledger database opened");
        Ok(Self { conn })
    }

    /// The single writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Fold the WAL back into the main database file.
    pub async fn checkpoint(&self) -> Result<(), CourierError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint before the handle is dropped.
    pub async fn close(&self) -> Result<(), CourierError> {
        self.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
