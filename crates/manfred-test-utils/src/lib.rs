// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Manfred.
//!
//! - [`MockRunner`] - agent runner with queued outputs and injectable failures
//! - [`MockTracker`] - issue tracker that records every call
//! - [`TestHarness`] - orchestrator wired to both mocks and a temp SQLite store

pub mod harness;
pub mod mock_runner;
pub mod mock_tracker;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_runner::MockRunner;
pub use mock_tracker::{MockTracker, PostedComment};
