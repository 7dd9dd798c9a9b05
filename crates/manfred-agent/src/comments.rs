// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! What the agent writes into tracker comments and how it reads replies.
//!
//! Every comment the agent posts starts with a hidden HTML marker naming the
//! session and phase, so the agent can recognize (and ignore) its own
//! comments when they come back through a webhook.

use std::sync::LazyLock;

use manfred_config::AgentConfig;
use manfred_core::{ManfredError, Phase};
use regex::Regex;

static HTML_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

/// Footer separator; everything after it is boilerplate.
const FOOTER_SEPARATOR: &str = "\n---\n";

/// Session and phase recovered from a marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentMarker {
    pub session_id: String,
    /// Raw phase text from the marker, not necessarily a known phase.
    pub phase: String,
}

impl CommentMarker {
    pub fn phase(&self) -> Option<Phase> {
        self.phase.parse().ok()
    }
}

/// Comment formatting and reply classification for one agent identity.
#[derive(Debug, Clone)]
pub struct CommentPolicy {
    mention: String,
    marker_prefix: String,
    marker: Regex,
    approval: Regex,
    retry: Regex,
}

impl CommentPolicy {
    /// Builds the policy for `mention` (e.g. `@claude`) and a marker
    /// namespace (e.g. `manfred`).
    pub fn new(mention: &str, marker_prefix: &str) -> Result<Self, ManfredError> {
        let m = regex::escape(mention);
        let p = regex::escape(marker_prefix);
        let build = |pattern: String| {
            Regex::new(&pattern).map_err(|e| ManfredError::Config(format!("comment pattern: {e}")))
        };
        Ok(Self {
            mention: mention.to_string(),
            marker_prefix: marker_prefix.to_string(),
            marker: build(format!(r"<!--\s*{p}:session:([^:\s]+):phase:([a-z_]+)\s*-->"))?,
            approval: build(format!(
                r"(?im)(?:{m}\s+(?:approve|approved|lgtm|go\s+ahead)\b)|(?:^\s*/approve\b)"
            ))?,
            retry: build(format!(r"(?im)(?:{m}\s+retry\b)|(?:^\s*/retry\b)"))?,
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self, ManfredError> {
        Self::new(&config.mention, &config.marker_prefix)
    }

    pub fn mention(&self) -> &str {
        &self.mention
    }

    /// `<!-- <prefix>:session:<id>:phase:<phase> -->` followed by `body`.
    pub fn format_comment(&self, session_id: &str, phase: Phase, body: &str) -> String {
        format!(
            "<!-- {}:session:{session_id}:phase:{phase} -->\n\n{body}",
            self.marker_prefix
        )
    }

    /// Plan comment with an instruction footer.
    pub fn format_plan_comment(&self, session_id: &str, plan: &str) -> String {
        let body = format!(
            "## Implementation plan\n\n{plan}\n\n---\n\n<sub>Reply with `{} approve` to start \
             implementing, or comment with feedback to revise the plan.</sub>",
            self.mention
        );
        self.format_comment(session_id, Phase::AwaitingApproval, &body)
    }

    /// Error comment with a retry hint.
    pub fn format_error_comment(&self, session_id: &str, message: &str) -> String {
        let body = format!(
            "The session failed:\n\n```\n{message}\n```\n\n---\n\n<sub>Reply with `{} retry` to \
             start over.</sub>",
            self.mention
        );
        self.format_comment(session_id, Phase::Error, &body)
    }

    pub fn parse_marker(&self, body: &str) -> Option<CommentMarker> {
        let caps = self.marker.captures(body)?;
        Some(CommentMarker {
            session_id: caps[1].to_string(),
            phase: caps[2].to_string(),
        })
    }

    /// True for comments this agent posted.
    pub fn is_own_comment(&self, body: &str) -> bool {
        self.marker.is_match(body)
    }

    /// `<mention> approve|approved|lgtm|go ahead` anywhere, or a `/approve`
    /// line. Case-insensitive.
    pub fn is_approval(&self, body: &str) -> bool {
        self.approval.is_match(body)
    }

    /// `<mention> retry` anywhere, or a `/retry` line. Case-insensitive.
    pub fn is_retry_request(&self, body: &str) -> bool {
        self.retry.is_match(body)
    }
}

/// Human text of a comment: HTML comments and the footer removed, trimmed.
pub fn extract_feedback(body: &str) -> String {
    let stripped = HTML_COMMENT.replace_all(body, "");
    let without_footer = match stripped.find(FOOTER_SEPARATOR) {
        Some(idx) => &stripped[..idx],
        None => &stripped[..],
    };
    without_footer.trim().to_string()
}
