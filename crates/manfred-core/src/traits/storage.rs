// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable session storage.

use async_trait::async_trait;

use crate::error::ManfredError;
use crate::event::{EventType, SessionEvent};
use crate::filter::SessionFilter;
use crate::session::Session;
use crate::traits::adapter::Adapter;

/// Persistence for sessions and their event logs.
///
/// Implementations serialize all writes and apply each one atomically.
/// An operation that fails with [`ManfredError::Timeout`] has had no
/// effect, so the caller may retry it.
#[async_trait]
pub trait SessionStore: Adapter {
    /// Persists a new session.
    ///
    /// Fails with [`ManfredError::Validation`] when the session is invalid
    /// and [`ManfredError::AlreadyExists`] when a session for the same
    /// (owner, repository, issue) is already stored.
    async fn create(&self, session: &Session) -> Result<(), ManfredError>;

    /// Looks up a session by id. `Ok(None)` when absent.
    async fn get(&self, id: &str) -> Result<Option<Session>, ManfredError>;

    /// Looks up the session for an issue. `Ok(None)` when absent.
    async fn get_by_issue(
        &self,
        owner: &str,
        repository: &str,
        issue_number: i64,
    ) -> Result<Option<Session>, ManfredError>;

    /// Writes the mutable fields of an existing session.
    ///
    /// Fails with [`ManfredError::NotFound`] when no row matches.
    async fn update(&self, session: &Session) -> Result<(), ManfredError>;

    /// Removes a session and all of its events.
    async fn delete(&self, id: &str) -> Result<(), ManfredError>;

    /// Sessions matching `filter`, most recently active first.
    async fn list(&self, filter: &SessionFilter) -> Result<Vec<Session>, ManfredError>;

    /// Number of sessions matching `filter`. Ignores limit and offset.
    async fn count(&self, filter: &SessionFilter) -> Result<u64, ManfredError>;

    /// Appends an event to a session's log.
    async fn record_event(
        &self,
        session_id: &str,
        event_type: EventType,
        payload: Option<serde_json::Value>,
    ) -> Result<(), ManfredError>;

    /// The session's events, oldest first. Empty when there are none.
    async fn get_events(&self, session_id: &str) -> Result<Vec<SessionEvent>, ManfredError>;
}
