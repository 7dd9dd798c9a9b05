// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Commit-or-cancel handshake between a waiting caller and a queued write.
//!
//! A write closure sits in the connection queue until the background thread
//! gets to it. If the caller stops waiting first, the write must not land.
//! Both sides race for the token exactly once: the writer claims it right
//! before `COMMIT`, the caller claims it when its deadline fires. Whoever
//! loses backs off, so the caller's answer always matches the database.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const PENDING: u8 = 0;
const COMMITTING: u8 = 1;
const CANCELLED: u8 = 2;

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicU8>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the token for the writer. `false` means the caller already
    /// gave up and the transaction must roll back.
    pub fn begin_commit(&self) -> bool {
        self.0
            .compare_exchange(PENDING, COMMITTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claims the token for the caller. `false` means the commit is already
    /// under way and its result has to be awaited.
    pub fn cancel(&self) -> bool {
        self.0
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire) == CANCELLED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_before_commit_blocks_the_commit() {
        let token = CancelToken::new();
        assert!(token.cancel());
        assert!(token.is_cancelled());
        assert!(!token.begin_commit());
    }

    #[test]
    fn commit_before_cancel_wins() {
        let token = CancelToken::new();
        let writer = token.clone();
        assert!(writer.begin_commit());
        assert!(!token.cancel());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn each_side_claims_at_most_once() {
        let token = CancelToken::new();
        assert!(token.cancel());
        assert!(!token.cancel());

        let token = CancelToken::new();
        assert!(token.begin_commit());
        assert!(!token.begin_commit());
    }
}
