// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Manfred.
//!
//! Holds the session phase state machine, the [`Session`] entity, event and
//! filter types, the error taxonomy, and the collaborator traits the store,
//! runner, and tracker implement. Nothing here performs I/O.

pub mod error;
pub mod event;
pub mod filter;
pub mod phase;
pub mod session;
pub mod traits;
pub mod types;

pub use error::{ManfredError, ValidationError};
pub use event::{EventType, SessionEvent};
pub use filter::SessionFilter;
pub use phase::{
    can_transition, is_terminal, is_valid_phase, parse_phase, validate_transition, Phase,
    PhaseParseError, TransitionError,
};
pub use session::{branch_name, session_id, Session, SessionRecord, DEFAULT_BRANCH_PREFIX};
pub use types::{
    AdapterType, HealthStatus, Issue, IssueComment, NewPullRequest, PullRequest, RunOutput,
};

pub use traits::{Adapter, AgentRunner, IssueTracker, SessionStore};
