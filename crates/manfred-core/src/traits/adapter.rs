// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait shared by every collaborator.

use async_trait::async_trait;

use crate::error::ManfredError;
use crate::types::{AdapterType, HealthStatus};

/// Identity, health, and shutdown for a collaborator.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Human-readable name of this instance.
    fn name(&self) -> &str;

    fn adapter_type(&self) -> AdapterType;

    async fn health_check(&self) -> Result<HealthStatus, ManfredError>;

    /// Releases held resources. Further calls may fail.
    async fn shutdown(&self) -> Result<(), ManfredError>;
}
