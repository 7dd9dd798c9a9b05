// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations.
//!
//! The SQL files under `migrations/` are compiled in with refinery. Each
//! step runs in its own transaction and is recorded in
//! `refinery_schema_history`, so a re-run resumes after the last applied
//! version.

use manfred_core::ManfredError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Applies every pending migration.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), ManfredError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| ManfredError::Storage {
            source: Box::new(e),
        })?;
    for migration in report.applied_migrations() {
        tracing::info!(
            version = migration.version(),
            name = migration.name(),
            "applied migration"
        );
    }
    Ok(())
}

/// Highest applied migration version. Call after [`run_migrations`].
pub fn current_version(conn: &mut rusqlite::Connection) -> Result<Option<i32>, ManfredError> {
    let last = embedded::migrations::runner()
        .get_last_applied_migration(conn)
        .map_err(|e| ManfredError::Storage {
            source: Box::new(e),
        })?;
    Ok(last.map(|m| m.version()))
}

/// Highest version compiled into this binary.
pub fn latest_version() -> i32 {
    embedded::migrations::runner()
        .get_migrations()
        .iter()
        .map(|m| m.version())
        .max()
        .unwrap_or(0)
}
