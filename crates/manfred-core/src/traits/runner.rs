// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution environment that runs the coding agent.

use async_trait::async_trait;

use crate::error::ManfredError;
use crate::session::Session;
use crate::traits::adapter::Adapter;
use crate::types::RunOutput;

/// Starts an isolated environment for a session and runs prompts in it.
///
/// The handle returned by [`AgentRunner::start`] is what the session stores
/// as its `container_ref`.
#[async_trait]
pub trait AgentRunner: Adapter {
    /// Provisions an environment checked out on the session's branch.
    async fn start(&self, session: &Session) -> Result<String, ManfredError>;

    /// Runs `prompt` inside a started environment.
    async fn run(&self, container_ref: &str, prompt: &str) -> Result<RunOutput, ManfredError>;

    /// Tears the environment down. Stopping an unknown handle is not an error.
    async fn stop(&self, container_ref: &str) -> Result<(), ManfredError>;
}
