// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end orchestration tests against mock collaborators and a real
//! SQLite store.

use manfred_core::{
    EventType, IssueComment, ManfredError, Phase, Session, SessionFilter, SessionStore,
};
use manfred_test_utils::TestHarness;

fn comment_on(session: &Session, id: i64, body: &str) -> IssueComment {
    IssueComment {
        id,
        owner: session.owner().to_string(),
        repository: session.repository().to_string(),
        issue_number: session.issue_number(),
        body: body.to_string(),
        author: "alice".to_string(),
    }
}

async fn event_types(harness: &TestHarness, session_id: &str) -> Vec<EventType> {
    harness
        .store
        .get_events(session_id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect()
}

/// Drives a fresh issue up to `in_review`.
async fn session_in_review(harness: &TestHarness) -> Session {
    let issue = harness.open_issue("acme", "widgets", 7, "Add export").await;
    let session = harness.orchestrator.handle_issue_opened(&issue).await.unwrap();
    harness
        .orchestrator
        .handle_comment(&comment_on(&session, 1, "@claude approve"))
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn opened_issue_is_planned_and_posted() {
    let harness = TestHarness::builder()
        .with_runner_outputs(vec!["1. Add a CSV writer\n2. Wire it up".into()])
        .build()
        .await
        .unwrap();
    let issue = harness.open_issue("acme", "widgets", 7, "Add export").await;

    let session = harness.orchestrator.handle_issue_opened(&issue).await.unwrap();
    assert_eq!(session.id(), "acme-widgets-issue-7");
    assert_eq!(session.branch(), "claude/issue-7");
    assert_eq!(session.phase(), Phase::AwaitingApproval);
    assert!(session.container_ref().is_none());

    let stored = harness.store.get(session.id()).await.unwrap().unwrap();
    assert_eq!(stored, session);

    let comments = harness.tracker.comments().await;
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].number, 7);
    assert!(comments[0].body.contains("1. Add a CSV writer"));
    let marker = harness
        .orchestrator
        .policy()
        .parse_marker(&comments[0].body)
        .unwrap();
    assert_eq!(marker.session_id, session.id());
    assert_eq!(marker.phase(), Some(Phase::AwaitingApproval));

    assert_eq!(
        harness.tracker.labels("acme", "widgets", 7).await,
        ["manfred:awaiting_approval"]
    );
    assert_eq!(
        event_types(&harness, session.id()).await,
        [
            EventType::ContainerStart,
            EventType::ContainerStop,
            EventType::PhaseChange,
            EventType::CommentPosted,
        ]
    );
    assert!(harness.runner.running().await.is_empty());
    assert!(harness.runner.prompts().await[0].contains("Body of Add export"));
}

#[tokio::test]
async fn redelivered_issue_does_not_replan() {
    let harness = TestHarness::builder().build().await.unwrap();
    let issue = harness.open_issue("acme", "widgets", 3, "Fix bug").await;

    let first = harness.orchestrator.handle_issue_opened(&issue).await.unwrap();
    let second = harness.orchestrator.handle_issue_opened(&issue).await.unwrap();

    assert_eq!(first.id(), second.id());
    assert_eq!(second.phase(), Phase::AwaitingApproval);
    assert_eq!(harness.runner.prompts().await.len(), 1);
    assert_eq!(harness.tracker.comments().await.len(), 1);
}

#[tokio::test]
async fn approval_implements_and_opens_pull_request() {
    let harness = TestHarness::builder().build().await.unwrap();
    let session = session_in_review(&harness).await;

    assert_eq!(session.phase(), Phase::InReview);
    assert_eq!(session.pr_number(), Some(100));

    let prs = harness.tracker.pull_requests().await;
    assert_eq!(prs.len(), 1);
    assert_eq!(prs[0].head, "claude/issue-7");
    assert_eq!(prs[0].base, "main");
    assert!(prs[0].title.contains("#7"));
    assert!(prs[0].body.starts_with("Closes #7"));

    let prompts = harness.runner.prompts().await;
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("mock output"));

    let events = event_types(&harness, session.id()).await;
    assert!(events.contains(&EventType::CommentReceived));
    assert!(events.contains(&EventType::PrCreated));
    assert_eq!(
        harness.tracker.labels("acme", "widgets", 7).await,
        ["manfred:in_review"]
    );
}

#[tokio::test]
async fn custom_base_branch_and_prefix_are_used() {
    let agent = manfred_config::AgentConfig {
        branch_prefix: "bot".into(),
        ..Default::default()
    };
    let harness = TestHarness::builder()
        .with_agent_config(agent)
        .with_base_branch("develop")
        .build()
        .await
        .unwrap();
    session_in_review(&harness).await;

    let prs = harness.tracker.pull_requests().await;
    assert_eq!(prs[0].head, "bot/issue-7");
    assert_eq!(prs[0].base, "develop");
}

#[tokio::test]
async fn feedback_replans_with_previous_plan() {
    let harness = TestHarness::builder()
        .with_runner_outputs(vec!["plan A".into(), "plan B".into()])
        .build()
        .await
        .unwrap();
    let issue = harness.open_issue("acme", "widgets", 7, "Add export").await;
    let session = harness.orchestrator.handle_issue_opened(&issue).await.unwrap();

    let revised = harness
        .orchestrator
        .handle_comment(&comment_on(&session, 2, "Please emit JSON instead."))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(revised.phase(), Phase::AwaitingApproval);
    assert_eq!(revised.plan_text(), Some("plan B"));
    let prompts = harness.runner.prompts().await;
    assert!(prompts[1].contains("Previous plan:\nplan A"));
    assert!(prompts[1].contains("Please emit JSON instead."));
    assert_eq!(harness.tracker.comments().await.len(), 2);
}

#[tokio::test]
async fn own_and_empty_comments_change_nothing() {
    let harness = TestHarness::builder().build().await.unwrap();
    let issue = harness.open_issue("acme", "widgets", 7, "Add export").await;
    let session = harness.orchestrator.handle_issue_opened(&issue).await.unwrap();

    let own = harness
        .orchestrator
        .policy()
        .format_comment(session.id(), Phase::Planning, "@claude approve");
    assert!(
        harness
            .orchestrator
            .handle_comment(&comment_on(&session, 3, &own))
            .await
            .unwrap()
            .is_none()
    );

    let blank = harness
        .orchestrator
        .handle_comment(&comment_on(&session, 4, "<!-- hidden -->  "))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(blank.phase(), Phase::AwaitingApproval);
    assert_eq!(harness.runner.prompts().await.len(), 1);
}

#[tokio::test]
async fn comment_without_session_is_ignored() {
    let harness = TestHarness::builder().build().await.unwrap();
    let stranger = IssueComment {
        id: 1,
        owner: "acme".into(),
        repository: "widgets".into(),
        issue_number: 99,
        body: "@claude approve".into(),
        author: "bob".into(),
    };
    assert!(
        harness
            .orchestrator
            .handle_comment(&stranger)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(harness.store.count(&SessionFilter::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn runner_failure_moves_session_to_error() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.runner.push_failure("container crashed").await;
    let issue = harness.open_issue("acme", "widgets", 7, "Add export").await;

    let err = harness
        .orchestrator
        .handle_issue_opened(&issue)
        .await
        .unwrap_err();
    assert!(matches!(err, ManfredError::Runner { .. }));

    let stored = harness
        .store
        .get("acme-widgets-issue-7")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.phase(), Phase::Error);
    assert_eq!(stored.error_text(), Some("runner error: container crashed"));
    assert!(stored.container_ref().is_none());
    assert!(harness.runner.running().await.is_empty());

    let comments = harness.tracker.comments().await;
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.contains("container crashed"));
    assert!(comments[0].body.contains("@claude retry"));

    assert!(event_types(&harness, stored.id()).await.contains(&EventType::Error));
    assert_eq!(
        harness.tracker.labels("acme", "widgets", 7).await,
        ["manfred:error"]
    );
}

#[tokio::test]
async fn retry_after_error_replans() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.runner.push_failure("flaky").await;
    let issue = harness.open_issue("acme", "widgets", 7, "Add export").await;
    assert!(harness.orchestrator.handle_issue_opened(&issue).await.is_err());

    let failed = harness
        .store
        .get_by_issue("acme", "widgets", 7)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.phase(), Phase::Error);

    // Not a retry request: stays failed.
    let same = harness
        .orchestrator
        .handle_comment(&comment_on(&failed, 5, "why did this fail?"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(same.phase(), Phase::Error);

    let retried = harness
        .orchestrator
        .handle_comment(&comment_on(&failed, 6, "/retry"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(retried.phase(), Phase::AwaitingApproval);
    assert_eq!(retried.plan_text(), Some("mock output"));
    assert_eq!(
        harness.tracker.labels("acme", "widgets", 7).await,
        ["manfred:awaiting_approval"]
    );
}

#[tokio::test]
async fn start_failure_leaves_no_container_ref() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.runner.fail_starts().await;
    let issue = harness.open_issue("acme", "widgets", 9, "Add import").await;

    let err = harness
        .orchestrator
        .handle_issue_opened(&issue)
        .await
        .unwrap_err();
    assert!(matches!(err, ManfredError::Runner { .. }));
    let stored = harness
        .store
        .get("acme-widgets-issue-9")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.phase(), Phase::Error);
    assert!(stored.container_ref().is_none());
    assert!(harness.runner.prompts().await.is_empty());
}

#[tokio::test]
async fn pull_request_failure_fails_session() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.tracker.fail_pull_requests().await;
    let issue = harness.open_issue("acme", "widgets", 7, "Add export").await;
    let session = harness.orchestrator.handle_issue_opened(&issue).await.unwrap();

    let err = harness
        .orchestrator
        .handle_comment(&comment_on(&session, 1, "LGTM\n/approve"))
        .await
        .unwrap_err();
    assert!(matches!(err, ManfredError::Tracker { .. }));

    let stored = harness.store.get(session.id()).await.unwrap().unwrap();
    assert_eq!(stored.phase(), Phase::Error);
    assert!(stored.pr_number().is_none());
    assert_eq!(stored.plan_text(), session.plan_text());
}

#[tokio::test]
async fn review_feedback_revises_and_returns_to_review() {
    let harness = TestHarness::builder().build().await.unwrap();
    let session = session_in_review(&harness).await;
    harness
        .runner
        .push_output_with_summary("done", "Renamed the writer.")
        .await;

    let revised = harness
        .orchestrator
        .handle_review_feedback(session.id(), "rename CsvThing to CsvWriter")
        .await
        .unwrap();
    assert_eq!(revised.phase(), Phase::InReview);

    let prompts = harness.runner.prompts().await;
    assert!(prompts.last().unwrap().contains("rename CsvThing to CsvWriter"));

    let comments = harness.tracker.comments().await;
    let last = comments.last().unwrap();
    assert_eq!(last.number, 100);
    assert!(last.body.contains("Renamed the writer."));

    let phase_changes = harness
        .store
        .get_events(session.id())
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == EventType::PhaseChange)
        .count();
    // planning->awaiting, awaiting->implementing, implementing->review,
    // review->revising, revising->review
    assert_eq!(phase_changes, 5);
}

#[tokio::test]
async fn merge_completes_session() {
    let harness = TestHarness::builder().build().await.unwrap();
    let session = session_in_review(&harness).await;

    let done = harness
        .orchestrator
        .handle_pull_request_merged(session.id())
        .await
        .unwrap();
    assert_eq!(done.phase(), Phase::Completed);
    assert_eq!(
        harness
            .store
            .count(&SessionFilter::new().active_only())
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        harness.tracker.labels("acme", "widgets", 7).await,
        ["manfred:completed"]
    );

    // Terminal: further review feedback is rejected and nothing changes.
    let err = harness
        .orchestrator
        .handle_review_feedback(session.id(), "one more thing")
        .await
        .unwrap_err();
    assert!(matches!(err, ManfredError::Transition(_)));
    let stored = harness.store.get(session.id()).await.unwrap().unwrap();
    assert_eq!(stored.phase(), Phase::Completed);
}

#[tokio::test]
async fn merge_out_of_phase_is_rejected() {
    let harness = TestHarness::builder().build().await.unwrap();
    let issue = harness.open_issue("acme", "widgets", 7, "Add export").await;
    let session = harness.orchestrator.handle_issue_opened(&issue).await.unwrap();

    let err = harness
        .orchestrator
        .handle_pull_request_merged(session.id())
        .await
        .unwrap_err();
    assert!(matches!(err, ManfredError::Transition(_)));
    assert_eq!(
        harness.store.get(session.id()).await.unwrap().unwrap().phase(),
        Phase::AwaitingApproval
    );

    let missing = harness
        .orchestrator
        .handle_pull_request_merged("acme-widgets-issue-404")
        .await
        .unwrap_err();
    assert!(missing.is_not_found());
}

#[tokio::test]
async fn racing_triggers_resolve_to_one_session() {
    let harness = TestHarness::builder().build().await.unwrap();
    let o = &harness.orchestrator;

    let (a, b, c, d) = tokio::join!(
        o.resolve_session("acme", "widgets", 12),
        o.resolve_session("acme", "widgets", 12),
        o.resolve_session("acme", "widgets", 12),
        o.resolve_session("acme", "widgets", 12),
    );
    let resolved = [a.unwrap(), b.unwrap(), c.unwrap(), d.unwrap()];
    assert!(resolved.iter().all(|r| r.session == resolved[0].session));
    assert_eq!(resolved.iter().filter(|r| r.created).count(), 1);
    assert_eq!(harness.store.count(&SessionFilter::new()).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_issue_triggers_plan_once() {
    let harness = TestHarness::builder().build().await.unwrap();
    let issue = harness.open_issue("acme", "widgets", 13, "Add import").await;

    let (a, b) = tokio::join!(
        harness.orchestrator.handle_issue_opened(&issue),
        harness.orchestrator.handle_issue_opened(&issue),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.id(), b.id());
    assert!(
        [a.phase(), b.phase()].contains(&Phase::AwaitingApproval),
        "one trigger should have planned: {:?} / {:?}",
        a.phase(),
        b.phase()
    );

    assert_eq!(harness.runner.prompts().await.len(), 1);
    assert_eq!(harness.tracker.comments().await.len(), 1);
    let stored = harness.store.get(a.id()).await.unwrap().unwrap();
    assert_eq!(stored.phase(), Phase::AwaitingApproval);
}

#[tokio::test]
async fn session_deleted_mid_run_still_stops_the_container() {
    let harness = TestHarness::builder().build().await.unwrap();
    let resolved = harness
        .orchestrator
        .resolve_session("acme", "widgets", 14)
        .await
        .unwrap();
    harness.open_issue("acme", "widgets", 14, "Add search").await;
    harness.store.delete(resolved.session.id()).await.unwrap();

    let err = harness
        .orchestrator
        .run_planning(resolved.session, None)
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
    assert!(harness.runner.running().await.is_empty());
    assert!(harness.runner.prompts().await.is_empty());
}

#[tokio::test]
async fn failed_error_comment_still_records_failure() {
    let harness = TestHarness::builder().build().await.unwrap();
    let mut session = harness
        .orchestrator
        .resolve_session("acme", "widgets", 21)
        .await
        .unwrap()
        .session;
    harness.tracker.fail_comments().await;

    harness
        .orchestrator
        .fail(&mut session, "disk full")
        .await
        .unwrap();

    let stored = harness.store.get(session.id()).await.unwrap().unwrap();
    assert_eq!(stored.phase(), Phase::Error);
    assert_eq!(stored.error_text(), Some("disk full"));
    assert!(harness.tracker.comments().await.is_empty());
    assert_eq!(
        event_types(&harness, session.id()).await,
        [EventType::Error]
    );
}
