// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database handle with PRAGMA setup, migrations, and lifecycle.
//!
//! `Database` wraps exactly one `tokio_rusqlite::Connection`. Every query
//! closure runs on that connection's background thread, one at a time, which
//! makes it the single writer for the store. Do not open a second connection
//! for writes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use manfred_core::ManfredError;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::migrations;

/// Connection settings applied on open.
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub wal_mode: bool,
    pub busy_timeout: Duration,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            wal_mode: true,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

impl From<&manfred_config::StorageConfig> for DatabaseOptions {
    fn from(config: &manfred_config::StorageConfig) -> Self {
        Self {
            wal_mode: config.wal_mode,
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }
    }
}

pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: PathBuf,
}

impl Database {
    /// Opens with default options. See [`Database::open_with`].
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ManfredError> {
        Self::open_with(path, &DatabaseOptions::default()).await
    }

    /// Opens (creating if needed) the database at `path`, applies PRAGMAs,
    /// and runs pending migrations.
    ///
    /// The parent directory is created when missing.
    pub async fn open_with(
        path: impl AsRef<Path>,
        options: &DatabaseOptions,
    ) -> Result<Self, ManfredError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ManfredError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(|e| ManfredError::Storage {
                source: Box::new(e),
            })?;

        let wal_mode = options.wal_mode;
        let busy_timeout = options.busy_timeout;
        conn.call(move |conn| -> Result<(), ManfredError> {
            apply_pragmas(conn, wal_mode, busy_timeout).map_err(|e| ManfredError::Storage {
                source: Box::new(e),
            })?;
            migrations::run_migrations(conn)
        })
        .await
        .map_err(map_call_err)?;

        debug!(path = %path.display(), wal_mode, "database opened");
        Ok(Self { conn, path })
    }

    /// The single connection all queries go through.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `write` inside a transaction on the writer connection.
    ///
    /// The transaction commits only if `token` can still be claimed for the
    /// writer. A token cancelled while the closure waited in the queue, or
    /// while it ran, rolls everything back.
    pub async fn write_tx<T, F>(&self, token: CancelToken, write: F) -> Result<T, ManfredError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, ManfredError> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn| {
                if token.is_cancelled() {
                    return Err(write_cancelled());
                }
                let tx = conn.transaction().map_err(storage_err)?;
                let value = write(&tx)?;
                if !token.begin_commit() {
                    return Err(write_cancelled());
                }
                tx.commit().map_err(storage_err)?;
                Ok(value)
            })
            .await
            .map_err(map_call_err)
    }

    /// Highest applied migration version.
    pub async fn schema_version(&self) -> Result<Option<i32>, ManfredError> {
        self.conn
            .call(migrations::current_version)
            .await
            .map_err(map_call_err)
    }

    /// Flushes the WAL into the main file.
    pub async fn checkpoint(&self) -> Result<(), ManfredError> {
        self.conn
            .call(|conn| conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);"))
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Checkpoints and closes the connection.
    pub async fn close(self) -> Result<(), ManfredError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(|e| ManfredError::Storage {
            source: e.to_string().into(),
        })
    }
}

fn apply_pragmas(
    conn: &rusqlite::Connection,
    wal_mode: bool,
    busy_timeout: Duration,
) -> Result<(), rusqlite::Error> {
    if wal_mode {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
    }
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

pub(crate) fn storage_err(e: rusqlite::Error) -> ManfredError {
    ManfredError::Storage {
        source: Box::new(e),
    }
}

fn write_cancelled() -> ManfredError {
    ManfredError::Storage {
        source: "write cancelled before commit".into(),
    }
}

/// Maps a failed rusqlite closure to a storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ManfredError {
    match e {
        tokio_rusqlite::Error::Error(inner) => storage_err(inner),
        other => ManfredError::Storage {
            source: other.to_string().into(),
        },
    }
}

/// Unwraps closures that already produce a [`ManfredError`].
pub fn map_call_err(e: tokio_rusqlite::Error<ManfredError>) -> ManfredError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        other => ManfredError::Storage {
            source: other.to_string().into(),
        },
    }
}
