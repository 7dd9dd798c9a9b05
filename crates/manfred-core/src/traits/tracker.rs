// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Issue tracker the orchestrator talks to.

use async_trait::async_trait;

use crate::error::ManfredError;
use crate::traits::adapter::Adapter;
use crate::types::{Issue, IssueComment, NewPullRequest, PullRequest};

#[async_trait]
pub trait IssueTracker: Adapter {
    async fn get_issue(
        &self,
        owner: &str,
        repository: &str,
        number: i64,
    ) -> Result<Issue, ManfredError>;

    /// Posts a comment on an issue or pull request.
    async fn post_comment(
        &self,
        owner: &str,
        repository: &str,
        number: i64,
        body: &str,
    ) -> Result<IssueComment, ManfredError>;

    async fn create_pull_request(
        &self,
        owner: &str,
        repository: &str,
        request: &NewPullRequest,
    ) -> Result<PullRequest, ManfredError>;

    async fn add_label(
        &self,
        owner: &str,
        repository: &str,
        number: i64,
        label: &str,
    ) -> Result<(), ManfredError>;

    async fn remove_label(
        &self,
        owner: &str,
        repository: &str,
        number: i64,
        label: &str,
    ) -> Result<(), ManfredError>;
}
