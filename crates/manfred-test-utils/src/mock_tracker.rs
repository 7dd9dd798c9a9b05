// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock issue tracker that records every call.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use manfred_core::{
    Adapter, AdapterType, HealthStatus, Issue, IssueComment, IssueTracker, ManfredError,
    NewPullRequest, PullRequest,
};

/// A comment captured by [`MockTracker::post_comment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedComment {
    pub owner: String,
    pub repository: String,
    pub number: i64,
    pub body: String,
}

type IssueKey = (String, String, i64);

/// Tracker backed by in-memory maps.
///
/// Issues must be registered with [`MockTracker::add_issue`] before
/// `get_issue` finds them. Pull requests are numbered from 100.
pub struct MockTracker {
    issues: Arc<Mutex<HashMap<IssueKey, Issue>>>,
    comments: Arc<Mutex<Vec<PostedComment>>>,
    pull_requests: Arc<Mutex<Vec<NewPullRequest>>>,
    labels: Arc<Mutex<HashMap<IssueKey, BTreeSet<String>>>>,
    fail_comments: Arc<Mutex<bool>>,
    fail_pull_requests: Arc<Mutex<bool>>,
}

impl MockTracker {
    pub fn new() -> Self {
        Self {
            issues: Arc::new(Mutex::new(HashMap::new())),
            comments: Arc::new(Mutex::new(Vec::new())),
            pull_requests: Arc::new(Mutex::new(Vec::new())),
            labels: Arc::new(Mutex::new(HashMap::new())),
            fail_comments: Arc::new(Mutex::new(false)),
            fail_pull_requests: Arc::new(Mutex::new(false)),
        }
    }

    pub async fn add_issue(&self, issue: Issue) {
        let key = (issue.owner.clone(), issue.repository.clone(), issue.number);
        self.issues.lock().await.insert(key, issue);
    }

    pub async fn comments(&self) -> Vec<PostedComment> {
        self.comments.lock().await.clone()
    }

    pub async fn pull_requests(&self) -> Vec<NewPullRequest> {
        self.pull_requests.lock().await.clone()
    }

    pub async fn labels(&self, owner: &str, repository: &str, number: i64) -> Vec<String> {
        self.labels
            .lock()
            .await
            .get(&(owner.to_string(), repository.to_string(), number))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Makes every subsequent `post_comment` fail.
    pub async fn fail_comments(&self) {
        *self.fail_comments.lock().await = true;
    }

    /// Makes every subsequent `create_pull_request` fail.
    pub async fn fail_pull_requests(&self) {
        *self.fail_pull_requests.lock().await = true;
    }
}

impl Default for MockTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MockTracker {
    fn name(&self) -> &str {
        "mock-tracker"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Tracker
    }

    async fn health_check(&self) -> Result<HealthStatus, ManfredError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ManfredError> {
        Ok(())
    }
}

#[async_trait]
impl IssueTracker for MockTracker {
    async fn get_issue(
        &self,
        owner: &str,
        repository: &str,
        number: i64,
    ) -> Result<Issue, ManfredError> {
        self.issues
            .lock()
            .await
            .get(&(owner.to_string(), repository.to_string(), number))
            .cloned()
            .ok_or_else(|| {
                ManfredError::tracker(format!("issue {owner}/{repository}#{number} not found"))
            })
    }

    async fn post_comment(
        &self,
        owner: &str,
        repository: &str,
        number: i64,
        body: &str,
    ) -> Result<IssueComment, ManfredError> {
        if *self.fail_comments.lock().await {
            return Err(ManfredError::tracker("comment rejected"));
        }
        let mut comments = self.comments.lock().await;
        comments.push(PostedComment {
            owner: owner.to_string(),
            repository: repository.to_string(),
            number,
            body: body.to_string(),
        });
        Ok(IssueComment {
            id: i64::try_from(comments.len()).unwrap_or(i64::MAX),
            owner: owner.to_string(),
            repository: repository.to_string(),
            issue_number: number,
            body: body.to_string(),
            author: "manfred[bot]".to_string(),
        })
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repository: &str,
        request: &NewPullRequest,
    ) -> Result<PullRequest, ManfredError> {
        if *self.fail_pull_requests.lock().await {
            return Err(ManfredError::tracker("pull request rejected"));
        }
        let mut prs = self.pull_requests.lock().await;
        prs.push(request.clone());
        let number = 99 + i64::try_from(prs.len()).unwrap_or(0);
        Ok(PullRequest {
            number,
            url: format!("https://example.test/{owner}/{repository}/pull/{number}"),
        })
    }

    async fn add_label(
        &self,
        owner: &str,
        repository: &str,
        number: i64,
        label: &str,
    ) -> Result<(), ManfredError> {
        self.labels
            .lock()
            .await
            .entry((owner.to_string(), repository.to_string(), number))
            .or_default()
            .insert(label.to_string());
        Ok(())
    }

    async fn remove_label(
        &self,
        owner: &str,
        repository: &str,
        number: i64,
        label: &str,
    ) -> Result<(), ManfredError> {
        if let Some(set) = self
            .labels
            .lock()
            .await
            .get_mut(&(owner.to_string(), repository.to_string(), number))
        {
            set.remove(label);
        }
        Ok(())
    }
}
