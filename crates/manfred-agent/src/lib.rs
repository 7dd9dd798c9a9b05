// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session orchestration for Manfred.
//!
//! The [`Orchestrator`] turns triggers (a new issue, a comment, review
//! feedback, a merge) into phase changes on the matching session. It talks
//! to the outside world only through the `SessionStore`, `AgentRunner` and
//! `IssueTracker` traits.

pub mod comments;
pub mod orchestrator;

pub use comments::{extract_feedback, CommentMarker, CommentPolicy};
pub use orchestrator::{Orchestrator, ResolvedSession, DEFAULT_BASE_BRANCH};
