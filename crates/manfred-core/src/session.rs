// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session entity: one unit of work tied to an (owner, repository, issue)
//! triple.
//!
//! All mutations go through methods on [`Session`] so that phase changes are
//! checked against the transition table and `last_activity` is bumped.
//! [`SessionRecord`] is the flat, field-for-field form used by storage
//! backends to rebuild a session from a row.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::ValidationError;
use crate::phase::{validate_transition, Phase, TransitionError};

/// Branch prefix used when no agent prefix is configured.
pub const DEFAULT_BRANCH_PREFIX: &str = "claude";

/// Deterministic session id for an issue. Re-delivering the same trigger
/// always yields the same id.
pub fn session_id(owner: &str, repository: &str, issue_number: i64) -> String {
    format!("{owner}-{repository}-issue-{issue_number}")
}

/// Deterministic working-branch name for an issue.
pub fn branch_name(prefix: &str, issue_number: i64) -> String {
    format!("{prefix}/issue-{issue_number}")
}

/// One unit of agent work.
///
/// Serializable for display output only. Sessions are built through
/// [`Session::new`] or from a stored [`SessionRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    id: String,
    owner: String,
    repository: String,
    issue_number: i64,
    pr_number: Option<i64>,
    phase: Phase,
    branch: String,
    container_ref: Option<String>,
    plan_text: Option<String>,
    error_text: Option<String>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl Session {
    /// Creates a session in `planning` with the default branch prefix.
    ///
    /// Inputs are not checked here; [`Session::validate`] runs before the
    /// session is persisted.
    pub fn new(owner: impl Into<String>, repository: impl Into<String>, issue_number: i64) -> Self {
        Self::with_branch_prefix(owner, repository, issue_number, DEFAULT_BRANCH_PREFIX)
    }

    /// Creates a session whose working branch uses `branch_prefix`.
    pub fn with_branch_prefix(
        owner: impl Into<String>,
        repository: impl Into<String>,
        issue_number: i64,
        branch_prefix: &str,
    ) -> Self {
        let owner = owner.into();
        let repository = repository.into();
        let now = Utc::now();
        Self {
            id: session_id(&owner, &repository, issue_number),
            branch: branch_name(branch_prefix, issue_number),
            owner,
            repository,
            issue_number,
            pr_number: None,
            phase: Phase::Planning,
            container_ref: None,
            plan_text: None,
            error_text: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn issue_number(&self) -> i64 {
        self.issue_number
    }

    pub fn pr_number(&self) -> Option<i64> {
        self.pr_number
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn container_ref(&self) -> Option<&str> {
        self.container_ref.as_deref()
    }

    pub fn plan_text(&self) -> Option<&str> {
        self.plan_text.as_deref()
    }

    pub fn error_text(&self) -> Option<&str> {
        self.error_text.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// `owner/repository`.
    pub fn repo_full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }

    /// Whether the current phase has a legal edge to `target`.
    pub fn can_transition_to(&self, target: Phase) -> bool {
        self.phase.can_transition_to(target)
    }

    /// Moves to `target` if the table allows it.
    ///
    /// On failure nothing changes, including `last_activity`.
    pub fn transition_to(&mut self, target: Phase) -> Result<(), TransitionError> {
        validate_transition(self.phase, target)?;
        self.phase = target;
        self.touch();
        Ok(())
    }

    /// Records the agent's plan and moves to `awaiting_approval`.
    ///
    /// `plan_text` is only written when the transition succeeds.
    pub fn set_plan(&mut self, plan: impl Into<String>) -> Result<(), TransitionError> {
        self.transition_to(Phase::AwaitingApproval)?;
        self.plan_text = Some(plan.into());
        Ok(())
    }

    /// A human approved the posted plan: `awaiting_approval -> implementing`.
    pub fn approve(&mut self) -> Result<(), TransitionError> {
        self.transition_to(Phase::Implementing)
    }

    /// Puts the session into `error` with a diagnostic message.
    ///
    /// This cannot fail. When the table has no edge to `error` (the session
    /// is already `completed` or `error`), the phase is forced.
    pub fn set_error(&mut self, message: impl Into<String>) {
        if let Err(e) = self.transition_to(Phase::Error) {
            warn!(
                session_id = %self.id,
                from = %e.from,
                "forcing session into error phase outside the transition table"
            );
            self.phase = Phase::Error;
        }
        self.error_text = Some(message.into());
        self.touch();
    }

    pub fn set_pr_number(&mut self, pr_number: i64) {
        self.pr_number = Some(pr_number);
        self.touch();
    }

    pub fn set_container_ref(&mut self, container_ref: impl Into<String>) {
        self.container_ref = Some(container_ref.into());
        self.touch();
    }

    pub fn clear_container_ref(&mut self) {
        self.container_ref = None;
        self.touch();
    }

    /// Bumps `last_activity` to now. Never moves it before `created_at`.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now().max(self.created_at);
    }

    /// Checks every field invariant. Storage backends call this before each
    /// create and update.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingId);
        }
        if self.owner.is_empty() {
            return Err(ValidationError::MissingOwner);
        }
        if self.repository.is_empty() {
            return Err(ValidationError::MissingRepository);
        }
        if self.issue_number <= 0 {
            return Err(ValidationError::NonPositiveIssueNumber(self.issue_number));
        }
        if self.branch.is_empty() {
            return Err(ValidationError::MissingBranch);
        }
        if self.last_activity < self.created_at {
            return Err(ValidationError::ActivityBeforeCreation);
        }
        Ok(())
    }
}

/// Flat form of a [`Session`] as it is persisted.
///
/// Storage backends read rows into this and convert with `Session::from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: String,
    pub owner: String,
    pub repository: String,
    pub issue_number: i64,
    pub pr_number: Option<i64>,
    pub phase: Phase,
    pub branch: String,
    pub container_ref: Option<String>,
    pub plan_text: Option<String>,
    pub error_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl From<SessionRecord> for Session {
    fn from(r: SessionRecord) -> Self {
        Self {
            id: r.id,
            owner: r.owner,
            repository: r.repository,
            issue_number: r.issue_number,
            pr_number: r.pr_number,
            phase: r.phase,
            branch: r.branch,
            container_ref: r.container_ref,
            plan_text: r.plan_text,
            error_text: r.error_text,
            created_at: r.created_at,
            last_activity: r.last_activity,
        }
    }
}

impl From<&Session> for SessionRecord {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id.clone(),
            owner: s.owner.clone(),
            repository: s.repository.clone(),
            issue_number: s.issue_number,
            pr_number: s.pr_number,
            phase: s.phase,
            branch: s.branch.clone(),
            container_ref: s.container_ref.clone(),
            plan_text: s.plan_text.clone(),
            error_text: s.error_text.clone(),
            created_at: s.created_at,
            last_activity: s.last_activity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn new_session_derives_id_and_branch() {
        let s = Session::new("acme", "widgets", 42);
        assert_eq!(s.id(), "acme-widgets-issue-42");
        assert_eq!(s.branch(), "claude/issue-42");
        assert_eq!(s.phase(), Phase::Planning);
        assert_eq!(s.created_at(), s.last_activity());
        assert_eq!(s.repo_full_name(), "acme/widgets");
        assert!(s.pr_number().is_none());
        assert!(s.container_ref().is_none());
    }

    #[test]
    fn configured_branch_prefix() {
        let s = Session::with_branch_prefix("acme", "widgets", 7, "bot");
        assert_eq!(s.branch(), "bot/issue-7");
        assert_eq!(s.id(), "acme-widgets-issue-7");
    }

    #[test]
    fn failed_transition_leaves_session_untouched() {
        let mut s = Session::new("acme", "widgets", 1);
        let before = s.clone();
        let err = s.transition_to(Phase::Completed).unwrap_err();
        assert_eq!(err.from, Phase::Planning);
        assert_eq!(err.to, Phase::Completed);
        assert_eq!(s, before);
    }

    #[test]
    fn set_plan_moves_to_awaiting_approval() {
        let mut s = Session::new("acme", "widgets", 1);
        s.set_plan("do X").unwrap();
        assert_eq!(s.phase(), Phase::AwaitingApproval);
        assert_eq!(s.plan_text(), Some("do X"));
    }

    #[test]
    fn set_plan_from_implementing_keeps_prior_plan() {
        let mut s = Session::new("acme", "widgets", 1);
        s.set_plan("first").unwrap();
        s.approve().unwrap();
        assert_eq!(s.phase(), Phase::Implementing);

        let err = s.set_plan("second").unwrap_err();
        assert_eq!(
            err,
            TransitionError {
                from: Phase::Implementing,
                to: Phase::AwaitingApproval
            }
        );
        assert_eq!(s.plan_text(), Some("first"));
        assert_eq!(s.phase(), Phase::Implementing);
    }

    #[test]
    fn approve_without_plan_fails() {
        let mut s = Session::new("acme", "widgets", 1);
        let err = s.approve().unwrap_err();
        assert_eq!(
            err,
            TransitionError {
                from: Phase::Planning,
                to: Phase::Implementing
            }
        );
    }

    #[test]
    fn set_error_from_every_phase() {
        for start in Phase::ALL {
            let mut s: Session = SessionRecord {
                phase: start,
                ..SessionRecord::from(&Session::new("acme", "widgets", 3))
            }
            .into();
            s.set_error("boom");
            assert_eq!(s.phase(), Phase::Error, "from {start}");
            assert_eq!(s.error_text(), Some("boom"));
        }
    }

    #[traced_test]
    #[test]
    fn forced_error_is_logged() {
        let mut s = Session::new("acme", "widgets", 9);
        s.set_plan("p").unwrap();
        s.approve().unwrap();
        s.transition_to(Phase::InReview).unwrap();
        s.transition_to(Phase::Completed).unwrap();

        s.set_error("late failure");
        assert_eq!(s.phase(), Phase::Error);
        assert!(logs_contain("forcing session into error phase"));
    }

    #[test]
    fn setters_bump_last_activity() {
        let mut s = Session::new("acme", "widgets", 5);
        let created = s.created_at();

        s.set_pr_number(0);
        assert_eq!(s.pr_number(), Some(0));
        s.set_container_ref("c-123");
        assert_eq!(s.container_ref(), Some("c-123"));
        s.clear_container_ref();
        assert!(s.container_ref().is_none());
        s.touch();

        assert!(s.last_activity() >= created);
        assert_eq!(s.created_at(), created);
    }

    #[test]
    fn validate_rejects_bad_fields() {
        assert!(Session::new("acme", "widgets", 1).validate().is_ok());
        assert_eq!(
            Session::new("", "widgets", 1).validate(),
            Err(ValidationError::MissingOwner)
        );
        assert_eq!(
            Session::new("acme", "", 1).validate(),
            Err(ValidationError::MissingRepository)
        );
        assert_eq!(
            Session::new("acme", "widgets", 0).validate(),
            Err(ValidationError::NonPositiveIssueNumber(0))
        );
        assert_eq!(
            Session::with_branch_prefix("acme", "widgets", -3, "x").validate(),
            Err(ValidationError::NonPositiveIssueNumber(-3))
        );

        let mut record = SessionRecord::from(&Session::new("acme", "widgets", 1));
        record.branch.clear();
        assert_eq!(
            Session::from(record.clone()).validate(),
            Err(ValidationError::MissingBranch)
        );
        record.id.clear();
        assert_eq!(
            Session::from(record).validate(),
            Err(ValidationError::MissingId)
        );
    }

    #[test]
    fn validate_rejects_activity_before_creation() {
        let mut record = SessionRecord::from(&Session::new("acme", "widgets", 1));
        record.last_activity = record.created_at - chrono::Duration::seconds(1);
        assert_eq!(
            Session::from(record.clone()).validate(),
            Err(ValidationError::ActivityBeforeCreation)
        );

        record.last_activity = record.created_at;
        assert!(Session::from(record).validate().is_ok());
    }

    #[test]
    fn record_round_trip_preserves_fields() {
        let mut s = Session::new("acme", "widgets", 11);
        s.set_plan("plan").unwrap();
        s.set_pr_number(99);
        let back = Session::from(SessionRecord::from(&s));
        assert_eq!(back, s);
    }

    #[test]
    fn full_lifecycle() {
        let mut s = Session::new("acme", "widgets", 7);
        s.set_plan("plan A").unwrap();
        assert_eq!(s.phase(), Phase::AwaitingApproval);
        assert_eq!(s.plan_text(), Some("plan A"));

        s.approve().unwrap();
        assert_eq!(s.phase(), Phase::Implementing);

        s.transition_to(Phase::InReview).unwrap();
        s.transition_to(Phase::Completed).unwrap();
        assert!(s.phase().is_terminal());

        assert!(s.transition_to(Phase::Planning).is_err());
        assert_eq!(s.phase(), Phase::Completed);

        s.set_error("late failure");
        assert_eq!(s.phase(), Phase::Error);
        assert_eq!(s.error_text(), Some("late failure"));

        s.transition_to(Phase::Planning).unwrap();
        assert_eq!(s.phase(), Phase::Planning);
    }
}
