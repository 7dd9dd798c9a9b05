// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed queries. Each function takes `&Database` and runs one closure on
//! the writer connection. Writes also take a [`crate::CancelToken`] and run
//! as a single transaction.

pub mod events;
pub mod sessions;
