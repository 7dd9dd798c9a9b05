// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query criteria for listing and counting sessions.

use crate::phase::Phase;

/// Criteria for `list` and `count`. Unset fields do not constrain; set fields
/// combine with AND.
///
/// `limit` and `offset` only apply to `list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub owner: Option<String>,
    pub repository: Option<String>,
    pub phase: Option<Phase>,
    /// Excludes `completed` and `error` sessions.
    pub active_only: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SessionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn active_only(mut self) -> Self {
        self.active_only = true;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let f = SessionFilter::new()
            .owner("acme")
            .repository("widgets")
            .limit(10)
            .offset(5);
        assert_eq!(f.owner.as_deref(), Some("acme"));
        assert_eq!(f.repository.as_deref(), Some("widgets"));
        assert_eq!(f.limit, Some(10));
        assert_eq!(f.offset, Some(5));
        assert!(!f.active_only);
        assert!(f.phase.is_none());

        let f = SessionFilter::new().phase(Phase::Error).active_only();
        assert_eq!(f.phase, Some(Phase::Error));
        assert!(f.active_only);
    }
}
