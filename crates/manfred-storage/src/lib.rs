// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite session store for Manfred.
//!
//! WAL-mode SQLite with embedded versioned migrations, a single-writer
//! connection via `tokio-rusqlite`, and typed queries for sessions and their
//! event logs. [`SqliteSessionStore`] exposes it all through
//! `manfred_core::SessionStore`.

pub mod adapter;
pub mod cancel;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteSessionStore;
pub use cancel::CancelToken;
pub use database::{Database, DatabaseOptions};
