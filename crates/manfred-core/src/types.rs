// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the collaborator traits.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks. A failing check
/// returns an error instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
}

/// Kind of collaborator behind an [`crate::Adapter`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Runner,
    Tracker,
}

// --- Tracker types ---

/// An issue as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub owner: String,
    pub repository: String,
    pub number: i64,
    pub title: String,
    pub body: String,
    pub author: String,
}

/// A comment on an issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: i64,
    pub owner: String,
    pub repository: String,
    /// Issue or pull request number the comment belongs to.
    pub issue_number: i64,
    pub body: String,
    pub author: String,
}

/// Input for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    /// Source branch.
    pub head: String,
    /// Target branch.
    pub base: String,
}

/// A pull request opened by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: i64,
    pub url: String,
}

// --- Runner types ---

/// Result of one agent invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    /// What the agent printed; for planning runs this is the plan.
    pub output: String,
    /// Short commit summary, when the run produced changes.
    pub summary: Option<String>,
}
