// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end orchestration tests.
//!
//! `TestHarness` wires an [`Orchestrator`] to a [`MockRunner`], a
//! [`MockTracker`] and a SQLite session store in a temp directory.

use std::sync::Arc;

use manfred_agent::Orchestrator;
use manfred_config::AgentConfig;
use manfred_core::{Issue, ManfredError, SessionStore};
use manfred_storage::{DatabaseOptions, SqliteSessionStore};

use crate::mock_runner::MockRunner;
use crate::mock_tracker::MockTracker;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    outputs: Vec<String>,
    agent: AgentConfig,
    base_branch: Option<String>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            outputs: Vec::new(),
            agent: AgentConfig::default(),
            base_branch: None,
        }
    }

    /// Runner outputs, consumed one per agent run.
    pub fn with_runner_outputs(mut self, outputs: Vec<String>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_agent_config(mut self, agent: AgentConfig) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_base_branch(mut self, base: impl Into<String>) -> Self {
        self.base_branch = Some(base.into());
        self
    }

    pub async fn build(self) -> Result<TestHarness, ManfredError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ManfredError::Storage { source: e.into() })?;
        let store = Arc::new(SqliteSessionStore::new(
            temp_dir.path().join("test.db"),
            DatabaseOptions::default(),
        ));
        store.initialize().await?;

        let runner = Arc::new(MockRunner::new());
        for output in self.outputs {
            runner.push_output(output).await;
        }
        let tracker = Arc::new(MockTracker::new());

        let mut orchestrator = Orchestrator::new(
            Arc::clone(&store) as Arc<dyn SessionStore>,
            runner.clone(),
            tracker.clone(),
            &self.agent,
        )?;
        if let Some(base) = self.base_branch {
            orchestrator = orchestrator.with_base_branch(base);
        }

        Ok(TestHarness {
            orchestrator,
            store,
            runner,
            tracker,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete orchestration stack for integration tests.
pub struct TestHarness {
    pub orchestrator: Orchestrator,
    pub store: Arc<SqliteSessionStore>,
    pub runner: Arc<MockRunner>,
    pub tracker: Arc<MockTracker>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Registers an issue with the tracker and returns it.
    pub async fn open_issue(
        &self,
        owner: &str,
        repository: &str,
        number: i64,
        title: &str,
    ) -> Issue {
        let issue = Issue {
            owner: owner.to_string(),
            repository: repository.to_string(),
            number,
            title: title.to_string(),
            body: format!("Body of {title}"),
            author: "alice".to_string(),
        };
        self.tracker.add_issue(issue.clone()).await;
        issue
    }
}
