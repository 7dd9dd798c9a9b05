// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives sessions through their phases.
//!
//! The orchestrator resolves the session for a trigger, calls the agent
//! runner and the issue tracker, and persists every phase change through
//! the session store. Each phase change is written to the store before it
//! is reported anywhere else; the event log and labels that follow are best
//! effort.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use manfred_config::AgentConfig;
use manfred_core::{
    AgentRunner, EventType, Issue, IssueComment, IssueTracker, ManfredError, NewPullRequest,
    Phase, RunOutput, Session, SessionStore, TransitionError,
};

use crate::comments::{extract_feedback, CommentPolicy};

/// Branch pull requests target unless configured otherwise.
pub const DEFAULT_BASE_BRANCH: &str = "main";

/// Outcome of [`Orchestrator::resolve_session`].
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub session: Session,
    /// This call stored the session.
    pub created: bool,
}

impl ResolvedSession {
    fn existing(session: Session) -> Self {
        Self {
            session,
            created: false,
        }
    }
}

pub struct Orchestrator {
    store: Arc<dyn SessionStore>,
    runner: Arc<dyn AgentRunner>,
    tracker: Arc<dyn IssueTracker>,
    policy: CommentPolicy,
    branch_prefix: String,
    marker_prefix: String,
    base_branch: String,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        runner: Arc<dyn AgentRunner>,
        tracker: Arc<dyn IssueTracker>,
        config: &AgentConfig,
    ) -> Result<Self, ManfredError> {
        Ok(Self {
            store,
            runner,
            tracker,
            policy: CommentPolicy::from_config(config)?,
            branch_prefix: config.branch_prefix.clone(),
            marker_prefix: config.marker_prefix.clone(),
            base_branch: DEFAULT_BASE_BRANCH.to_string(),
        })
    }

    pub fn with_base_branch(mut self, base_branch: impl Into<String>) -> Self {
        self.base_branch = base_branch.into();
        self
    }

    pub fn policy(&self) -> &CommentPolicy {
        &self.policy
    }

    /// Returns the session for an issue, creating it when none exists.
    ///
    /// Two triggers racing for the same issue both end up with the one
    /// stored session: the loser of the create re-reads the winner's row.
    /// Only the winner sees `created == true`.
    pub async fn resolve_session(
        &self,
        owner: &str,
        repository: &str,
        issue_number: i64,
    ) -> Result<ResolvedSession, ManfredError> {
        if let Some(existing) = self
            .store
            .get_by_issue(owner, repository, issue_number)
            .await?
        {
            return Ok(ResolvedSession::existing(existing));
        }

        let session =
            Session::with_branch_prefix(owner, repository, issue_number, &self.branch_prefix);
        match self.store.create(&session).await {
            Ok(()) => {
                info!(session_id = %session.id(), "session created");
                Ok(ResolvedSession {
                    session,
                    created: true,
                })
            }
            Err(e) if e.is_already_exists() => {
                debug!(session_id = %session.id(), "lost create race, re-reading");
                self.store
                    .get_by_issue(owner, repository, issue_number)
                    .await?
                    .map(ResolvedSession::existing)
                    .ok_or(e)
            }
            Err(e) => Err(e),
        }
    }

    /// A new issue was opened (or the agent was assigned to one).
    ///
    /// Planning only starts when this call created the session. Re-deliveries
    /// and triggers that lost the create race return the stored session as
    /// is, even while the winner is still planning.
    pub async fn handle_issue_opened(&self, issue: &Issue) -> Result<Session, ManfredError> {
        let resolved = self
            .resolve_session(&issue.owner, &issue.repository, issue.number)
            .await?;
        if resolved.created {
            self.run_planning(resolved.session, None).await
        } else {
            let session = resolved.session;
            debug!(session_id = %session.id(), phase = %session.phase(), "issue already has a session");
            Ok(session)
        }
    }

    /// Runs the agent to produce a plan, then posts it for approval.
    pub async fn run_planning(
        &self,
        session: Session,
        feedback: Option<&str>,
    ) -> Result<Session, ManfredError> {
        check_transition(&session, Phase::AwaitingApproval)?;
        let mut session = session;
        match self.plan_step(&mut session, feedback).await {
            Ok(()) => Ok(session),
            Err(err) => Err(self.fail_with(&mut session, err).await),
        }
    }

    /// Reacts to a human comment on an issue.
    ///
    /// Returns `None` when the comment is ignored: the agent's own comments
    /// and comments on issues without a session.
    pub async fn handle_comment(
        &self,
        comment: &IssueComment,
    ) -> Result<Option<Session>, ManfredError> {
        if self.policy.is_own_comment(&comment.body) {
            debug!(comment_id = comment.id, "ignoring own comment");
            return Ok(None);
        }
        let Some(mut session) = self
            .store
            .get_by_issue(&comment.owner, &comment.repository, comment.issue_number)
            .await?
        else {
            return Ok(None);
        };

        self.record(
            session.id(),
            EventType::CommentReceived,
            Some(json!({ "comment_id": comment.id, "author": comment.author })),
        )
        .await;

        match session.phase() {
            Phase::AwaitingApproval if self.policy.is_approval(&comment.body) => {
                let from = session.phase();
                session.approve()?;
                self.commit_phase_change(&mut session, from).await?;
                self.run_implementation(session).await.map(Some)
            }
            Phase::AwaitingApproval => {
                let feedback = extract_feedback(&comment.body);
                if feedback.is_empty() {
                    return Ok(Some(session));
                }
                let from = session.phase();
                session.transition_to(Phase::Planning)?;
                self.commit_phase_change(&mut session, from).await?;
                self.run_planning(session, Some(&feedback)).await.map(Some)
            }
            Phase::Error if self.policy.is_retry_request(&comment.body) => {
                let from = session.phase();
                session.transition_to(Phase::Planning)?;
                self.commit_phase_change(&mut session, from).await?;
                self.run_planning(session, None).await.map(Some)
            }
            _ => Ok(Some(session)),
        }
    }

    /// Implements the approved plan and opens a pull request.
    pub async fn run_implementation(&self, session: Session) -> Result<Session, ManfredError> {
        if session.phase() != Phase::Implementing {
            return Err(TransitionError {
                from: session.phase(),
                to: Phase::InReview,
            }
            .into());
        }
        let mut session = session;
        match self.implement_step(&mut session).await {
            Ok(()) => Ok(session),
            Err(err) => Err(self.fail_with(&mut session, err).await),
        }
    }

    /// A reviewer asked for changes on the session's pull request.
    pub async fn handle_review_feedback(
        &self,
        session_id: &str,
        feedback: &str,
    ) -> Result<Session, ManfredError> {
        let mut session = self.load(session_id).await?;
        let from = session.phase();
        session.transition_to(Phase::Revising)?;
        self.commit_phase_change(&mut session, from).await?;
        match self.revise_step(&mut session, feedback).await {
            Ok(()) => Ok(session),
            Err(err) => Err(self.fail_with(&mut session, err).await),
        }
    }

    /// The session's pull request was merged.
    pub async fn handle_pull_request_merged(
        &self,
        session_id: &str,
    ) -> Result<Session, ManfredError> {
        let mut session = self.load(session_id).await?;
        let from = session.phase();
        session.transition_to(Phase::Completed)?;
        self.commit_phase_change(&mut session, from).await?;
        Ok(session)
    }

    /// Puts the session into `error`, persists it, and tells the issue.
    ///
    /// Only the store update can fail; the event and the comment are best
    /// effort.
    pub async fn fail(&self, session: &mut Session, message: &str) -> Result<(), ManfredError> {
        let from = session.phase();
        session.set_error(message);
        self.store.update(session).await?;
        warn!(session_id = %session.id(), %from, error = message, "session failed");

        self.record(
            session.id(),
            EventType::Error,
            Some(json!({ "from": from, "message": message })),
        )
        .await;
        self.relabel(session, from).await;

        let body = self.policy.format_error_comment(session.id(), message);
        self.post_on_issue(session, &body).await;
        Ok(())
    }

    // --- steps ---

    async fn plan_step(
        &self,
        session: &mut Session,
        feedback: Option<&str>,
    ) -> Result<(), ManfredError> {
        let issue = self
            .tracker
            .get_issue(session.owner(), session.repository(), session.issue_number())
            .await?;
        let prompt = planning_prompt(&issue, session.plan_text(), feedback);
        let output = self.run_agent(session, &prompt).await?;

        let from = session.phase();
        session.set_plan(output.output.trim())?;
        self.commit_phase_change(session, from).await?;

        let plan = session.plan_text().unwrap_or_default();
        let body = self.policy.format_plan_comment(session.id(), plan);
        self.tracker
            .post_comment(session.owner(), session.repository(), session.issue_number(), &body)
            .await?;
        self.record(session.id(), EventType::CommentPosted, Some(json!({ "kind": "plan" })))
            .await;
        Ok(())
    }

    async fn implement_step(&self, session: &mut Session) -> Result<(), ManfredError> {
        let issue = self
            .tracker
            .get_issue(session.owner(), session.repository(), session.issue_number())
            .await?;
        let plan = session.plan_text().unwrap_or_default().to_string();
        let output = self
            .run_agent(session, &implementation_prompt(&issue, &plan))
            .await?;

        let request = NewPullRequest {
            title: format!("Resolve #{}: {}", issue.number, issue.title),
            body: pull_request_body(&issue, &output),
            head: session.branch().to_string(),
            base: self.base_branch.clone(),
        };
        let pr = self
            .tracker
            .create_pull_request(session.owner(), session.repository(), &request)
            .await?;

        let from = session.phase();
        session.set_pr_number(pr.number);
        session.transition_to(Phase::InReview)?;
        self.commit_phase_change(session, from).await?;
        self.record(
            session.id(),
            EventType::PrCreated,
            Some(json!({ "pr_number": pr.number, "url": pr.url })),
        )
        .await;

        let body = self.policy.format_comment(
            session.id(),
            Phase::InReview,
            &format!("Opened pull request #{} for review: {}", pr.number, pr.url),
        );
        self.tracker
            .post_comment(session.owner(), session.repository(), session.issue_number(), &body)
            .await?;
        self.record(session.id(), EventType::CommentPosted, Some(json!({ "kind": "pr" })))
            .await;
        Ok(())
    }

    async fn revise_step(&self, session: &mut Session, feedback: &str) -> Result<(), ManfredError> {
        let output = self.run_agent(session, &revision_prompt(feedback)).await?;

        let from = session.phase();
        session.transition_to(Phase::InReview)?;
        self.commit_phase_change(session, from).await?;

        let summary = output.summary.as_deref().unwrap_or("Addressed review feedback.");
        let body = self.policy.format_comment(session.id(), Phase::InReview, summary);
        let target = session.pr_number().unwrap_or(session.issue_number());
        self.tracker
            .post_comment(session.owner(), session.repository(), target, &body)
            .await?;
        self.record(session.id(), EventType::CommentPosted, Some(json!({ "kind": "revision" })))
            .await;
        Ok(())
    }

    // --- plumbing ---

    /// Fails the session for `err` and hands `err` back to the caller.
    async fn fail_with(&self, session: &mut Session, err: ManfredError) -> ManfredError {
        if let Err(store_err) = self.fail(session, &err.to_string()).await {
            warn!(session_id = %session.id(), error = %store_err, "could not persist failure");
        }
        err
    }

    /// Starts an environment, runs `prompt`, and tears it down again. The
    /// container ref is stored on the session while it runs.
    ///
    /// Once `start` succeeds the container is always stopped, whatever
    /// fails afterwards. The first error wins.
    async fn run_agent(
        &self,
        session: &mut Session,
        prompt: &str,
    ) -> Result<RunOutput, ManfredError> {
        let container = self.runner.start(session).await?;
        session.set_container_ref(&container);
        let result = match self.store.update(session).await {
            Ok(()) => {
                self.record(
                    session.id(),
                    EventType::ContainerStart,
                    Some(json!({ "container_ref": container })),
                )
                .await;
                self.runner.run(&container, prompt).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = self.runner.stop(&container).await {
            warn!(session_id = %session.id(), container = %container, error = %e, "failed to stop container");
        }
        session.clear_container_ref();
        let cleared = self.store.update(session).await;
        if let Err(e) = &cleared {
            warn!(session_id = %session.id(), error = %e, "could not clear container ref");
        }
        self.record(
            session.id(),
            EventType::ContainerStop,
            Some(json!({ "container_ref": container, "ok": result.is_ok() })),
        )
        .await;

        let output = result?;
        cleared?;
        Ok(output)
    }

    /// Persists a phase change the session already made in memory.
    async fn commit_phase_change(
        &self,
        session: &mut Session,
        from: Phase,
    ) -> Result<(), ManfredError> {
        self.store.update(session).await?;
        let to = session.phase();
        info!(session_id = %session.id(), %from, %to, "phase changed");
        self.record(
            session.id(),
            EventType::PhaseChange,
            Some(json!({ "from": from, "to": to })),
        )
        .await;
        self.relabel(session, from).await;
        Ok(())
    }

    /// Swaps the `<marker_prefix>:<phase>` label on the issue.
    async fn relabel(&self, session: &Session, from: Phase) {
        let (owner, repo, number) = (
            session.owner(),
            session.repository(),
            session.issue_number(),
        );
        let old = format!("{}:{from}", self.marker_prefix);
        let new = format!("{}:{}", self.marker_prefix, session.phase());
        if let Err(e) = self.tracker.remove_label(owner, repo, number, &old).await {
            debug!(session_id = %session.id(), label = %old, error = %e, "could not remove label");
        }
        if let Err(e) = self.tracker.add_label(owner, repo, number, &new).await {
            warn!(session_id = %session.id(), label = %new, error = %e, "could not add label");
        }
    }

    async fn post_on_issue(&self, session: &Session, body: &str) {
        match self
            .tracker
            .post_comment(session.owner(), session.repository(), session.issue_number(), body)
            .await
        {
            Ok(_) => {
                self.record(session.id(), EventType::CommentPosted, Some(json!({ "kind": "error" })))
                    .await;
            }
            Err(e) => warn!(session_id = %session.id(), error = %e, "could not post comment"),
        }
    }

    /// Appends to the event log. Failures are logged and swallowed.
    async fn record(&self, session_id: &str, event_type: EventType, payload: Option<serde_json::Value>) {
        let kind = event_type.to_string();
        if let Err(e) = self.store.record_event(session_id, event_type, payload).await {
            warn!(session_id, event_type = %kind, error = %e, "failed to record session event");
        }
    }

    async fn load(&self, session_id: &str) -> Result<Session, ManfredError> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| ManfredError::NotFound {
                session_id: session_id.to_string(),
            })
    }
}

fn check_transition(session: &Session, target: Phase) -> Result<(), TransitionError> {
    if session.can_transition_to(target) {
        Ok(())
    } else {
        Err(TransitionError {
            from: session.phase(),
            to: target,
        })
    }
}

fn planning_prompt(issue: &Issue, previous_plan: Option<&str>, feedback: Option<&str>) -> String {
    let mut prompt = format!(
        "Write an implementation plan for issue #{} in {}/{}.\n\nTitle: {}\n\n{}\n",
        issue.number, issue.owner, issue.repository, issue.title, issue.body
    );
    if let Some(plan) = previous_plan {
        prompt.push_str(&format!("\nPrevious plan:\n{plan}\n"));
    }
    if let Some(feedback) = feedback {
        prompt.push_str(&format!("\nRevise the plan to address this feedback:\n{feedback}\n"));
    }
    prompt.push_str("\nDo not change any files yet. Reply with the plan only.");
    prompt
}

fn implementation_prompt(issue: &Issue, plan: &str) -> String {
    format!(
        "Implement issue #{} ({}) following the approved plan below. Commit your changes.\n\n{plan}",
        issue.number, issue.title
    )
}

fn revision_prompt(feedback: &str) -> String {
    format!("Address the following review feedback and commit your changes:\n\n{feedback}")
}

fn pull_request_body(issue: &Issue, output: &RunOutput) -> String {
    match &output.summary {
        Some(summary) => format!("Closes #{}\n\n{summary}", issue.number),
        None => format!("Closes #{}", issue.number),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue() -> Issue {
        Issue {
            owner: "acme".into(),
            repository: "widgets".into(),
            number: 7,
            title: "Add export".into(),
            body: "CSV please".into(),
            author: "alice".into(),
        }
    }

    #[test]
    fn planning_prompt_includes_feedback_and_previous_plan() {
        let prompt = planning_prompt(&issue(), Some("old plan"), Some("use JSON"));
        assert!(prompt.contains("issue #7 in acme/widgets"));
        assert!(prompt.contains("CSV please"));
        assert!(prompt.contains("Previous plan:\nold plan"));
        assert!(prompt.contains("use JSON"));
    }

    #[test]
    fn pr_body_closes_issue() {
        let out = RunOutput {
            output: String::new(),
            summary: Some("feat: export".into()),
        };
        assert_eq!(pull_request_body(&issue(), &out), "Closes #7\n\nfeat: export");
        assert_eq!(pull_request_body(&issue(), &RunOutput::default()), "Closes #7");
    }

    #[test]
    fn check_transition_reports_both_phases() {
        let s = Session::new("acme", "widgets", 1);
        let err = check_transition(&s, Phase::Completed).unwrap_err();
        assert_eq!(err.from, Phase::Planning);
        assert_eq!(err.to, Phase::Completed);
    }
}
