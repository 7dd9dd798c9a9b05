// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits.
//!
//! All collaborators extend the [`Adapter`] base trait and use
//! `#[async_trait]` so they can sit behind `Arc<dyn ...>`.

pub mod adapter;
pub mod runner;
pub mod storage;
pub mod tracker;

pub use adapter::Adapter;
pub use runner::AgentRunner;
pub use storage::SessionStore;
pub use tracker::IssueTracker;
