// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Manfred session core.

use thiserror::Error;

use crate::phase::{PhaseParseError, TransitionError};

/// A session whose fields violate an invariant.
///
/// Raised by [`crate::Session::validate`] before anything reaches durable
/// storage. Values are never coerced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("session ID is required")]
    MissingId,

    #[error("repository owner is required")]
    MissingOwner,

    #[error("repository name is required")]
    MissingRepository,

    #[error("issue number must be positive, got {0}")]
    NonPositiveIssueNumber(i64),

    #[error("branch name is required")]
    MissingBranch,

    #[error("last activity precedes creation time")]
    ActivityBeforeCreation,
}

/// The primary error type used across the session core, the store, and the
/// orchestrator.
#[derive(Debug, Error)]
pub enum ManfredError {
    /// Configuration errors (invalid TOML, failed validation).
    #[error("configuration error: {0}")]
    Config(String),

    /// A session failed invariant checks.
    #[error("invalid session: {0}")]
    Validation(#[from] ValidationError),

    /// A requested phase change is not in the transition table.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// User input did not name a phase.
    #[error(transparent)]
    PhaseParse(#[from] PhaseParseError),

    /// A create collided with an existing (owner, repository, issue) session.
    #[error(
        "session already exists for issue #{issue_number} in {owner}/{repository} (existing session: {session_id})"
    )]
    AlreadyExists {
        owner: String,
        repository: String,
        issue_number: i64,
        session_id: String,
    },

    /// Update, delete, or event append targeted a session that does not exist.
    #[error("session not found: {session_id}")]
    NotFound { session_id: String },

    /// Storage backend errors (I/O, corruption, lock timeout, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The execution environment failed to run the agent.
    #[error("runner error: {message}")]
    Runner {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The issue tracker rejected or failed a request.
    #[error("tracker error: {message}")]
    Tracker {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ManfredError {
    /// True for the "duplicate trigger" outcome of a create.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ManfredError::AlreadyExists { .. })
    }

    /// True when the target session was missing (never existed or lost a
    /// race with a concurrent delete).
    pub fn is_not_found(&self) -> bool {
        matches!(self, ManfredError::NotFound { .. })
    }

    /// Shorthand for a runner failure without an underlying source.
    pub fn runner(message: impl Into<String>) -> Self {
        ManfredError::Runner {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a tracker failure without an underlying source.
    pub fn tracker(message: impl Into<String>) -> Self {
        ManfredError::Tracker {
            message: message.into(),
            source: None,
        }
    }
}
