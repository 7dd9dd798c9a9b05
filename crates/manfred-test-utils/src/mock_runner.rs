// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock agent runner for deterministic tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use manfred_core::{
    Adapter, AdapterType, AgentRunner, HealthStatus, ManfredError, RunOutput, Session,
};

/// Runner that hands out `mock-container-N` refs and answers prompts from a
/// queue.
///
/// When the queue is empty, `run` echoes a fixed default. A queued `Err`
/// makes that run fail with a runner error.
pub struct MockRunner {
    outputs: Arc<Mutex<VecDeque<Result<RunOutput, String>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    running: Arc<Mutex<Vec<String>>>,
    next_id: AtomicU64,
    fail_start: Arc<Mutex<bool>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            outputs: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
            fail_start: Arc::new(Mutex::new(false)),
        }
    }

    /// Queues a successful run printing `output`.
    pub async fn push_output(&self, output: impl Into<String>) {
        self.outputs.lock().await.push_back(Ok(RunOutput {
            output: output.into(),
            summary: None,
        }));
    }

    /// Queues a successful run with a commit summary.
    pub async fn push_output_with_summary(
        &self,
        output: impl Into<String>,
        summary: impl Into<String>,
    ) {
        self.outputs.lock().await.push_back(Ok(RunOutput {
            output: output.into(),
            summary: Some(summary.into()),
        }));
    }

    /// Queues a failed run.
    pub async fn push_failure(&self, message: impl Into<String>) {
        self.outputs.lock().await.push_back(Err(message.into()));
    }

    /// Makes every subsequent `start` fail.
    pub async fn fail_starts(&self) {
        *self.fail_start.lock().await = true;
    }

    /// Every prompt passed to `run`, in order.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    /// Containers started and not yet stopped.
    pub async fn running(&self) -> Vec<String> {
        self.running.lock().await.clone()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MockRunner {
    fn name(&self) -> &str {
        "mock-runner"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Runner
    }

    async fn health_check(&self) -> Result<HealthStatus, ManfredError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ManfredError> {
        self.running.lock().await.clear();
        Ok(())
    }
}

#[async_trait]
impl AgentRunner for MockRunner {
    async fn start(&self, session: &Session) -> Result<String, ManfredError> {
        if *self.fail_start.lock().await {
            return Err(ManfredError::runner(format!(
                "cannot start container for {}",
                session.id()
            )));
        }
        let id = format!("mock-container-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.running.lock().await.push(id.clone());
        Ok(id)
    }

    async fn run(&self, container_ref: &str, prompt: &str) -> Result<RunOutput, ManfredError> {
        if !self.running.lock().await.iter().any(|c| c == container_ref) {
            return Err(ManfredError::runner(format!(
                "container {container_ref} is not running"
            )));
        }
        self.prompts.lock().await.push(prompt.to_string());
        match self.outputs.lock().await.pop_front() {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(ManfredError::runner(message)),
            None => Ok(RunOutput {
                output: "mock output".to_string(),
                summary: None,
            }),
        }
    }

    async fn stop(&self, container_ref: &str) -> Result<(), ManfredError> {
        self.running.lock().await.retain(|c| c != container_ref);
        Ok(())
    }
}
