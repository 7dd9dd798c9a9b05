// SPDX-FileCopyrightText: 2026 Manfred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workflow phases and the legal-transition table.
//!
//! Pure logic, no I/O. The table is deliberately conservative: the only
//! cycle that leaves a terminal phase is `error -> planning`, and
//! `completed` has no outgoing edge at all.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// One state in the seven-state session workflow.
///
/// `Display` and `FromStr` use the canonical lowercase wire form
/// (`awaiting_approval`, `in_review`, ...). [`Phase::display_name`] gives the
/// human form.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The agent is producing an implementation plan.
    Planning,
    /// A plan has been posted and waits for a human decision.
    AwaitingApproval,
    /// The approved plan is being implemented.
    Implementing,
    /// A pull request is open and under review.
    InReview,
    /// The agent is addressing review feedback.
    Revising,
    /// The work has been merged.
    Completed,
    /// The session failed; may be retried from scratch.
    Error,
}

impl Phase {
    /// Every phase, in workflow order.
    pub const ALL: [Phase; 7] = [
        Phase::Planning,
        Phase::AwaitingApproval,
        Phase::Implementing,
        Phase::InReview,
        Phase::Revising,
        Phase::Completed,
        Phase::Error,
    ];

    /// Phases that still represent in-flight work.
    pub const ACTIVE: [Phase; 5] = [
        Phase::Planning,
        Phase::AwaitingApproval,
        Phase::Implementing,
        Phase::InReview,
        Phase::Revising,
    ];

    /// Canonical lowercase wire form.
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Human-readable name for tables and comments.
    pub fn display_name(self) -> &'static str {
        match self {
            Phase::Planning => "Planning",
            Phase::AwaitingApproval => "Awaiting Approval",
            Phase::Implementing => "Implementing",
            Phase::InReview => "In Review",
            Phase::Revising => "Revising",
            Phase::Completed => "Completed",
            Phase::Error => "Error",
        }
    }

    /// True for `completed` and `error`.
    ///
    /// This is the end-of-workflow classification used for filtering and
    /// display. `error` still has the retry edge back to `planning`; use
    /// [`Phase::can_transition_to`] to ask whether a session can proceed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Error)
    }

    /// Inverse of [`Phase::is_terminal`].
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// The outgoing edges of this phase in the transition table.
    pub fn valid_transitions(self) -> &'static [Phase] {
        match self {
            Phase::Planning => &[Phase::AwaitingApproval, Phase::Error],
            Phase::AwaitingApproval => &[Phase::Planning, Phase::Implementing, Phase::Error],
            Phase::Implementing => &[Phase::InReview, Phase::Error],
            Phase::InReview => &[Phase::Revising, Phase::Completed, Phase::Error],
            Phase::Revising => &[Phase::InReview, Phase::Error],
            Phase::Completed => &[],
            Phase::Error => &[Phase::Planning],
        }
    }

    /// Table lookup: is `self -> target` a legal edge?
    pub fn can_transition_to(self, target: Phase) -> bool {
        self.valid_transitions().contains(&target)
    }
}

/// A requested phase change that is not in the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition from {from} to {to}")]
pub struct TransitionError {
    /// Phase the session was in.
    pub from: Phase,
    /// Phase that was requested.
    pub to: Phase,
}

/// Input that does not name one of the seven phases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid phase: {input:?}")]
pub struct PhaseParseError {
    /// The rejected input, verbatim.
    pub input: String,
}

/// True iff `value` is exactly one of the canonical phase strings.
///
/// Case-sensitive; use [`parse_phase`] for user input.
pub fn is_valid_phase(value: &str) -> bool {
    Phase::ALL.iter().any(|p| p.as_str() == value)
}

/// See [`Phase::is_terminal`].
pub fn is_terminal(phase: Phase) -> bool {
    phase.is_terminal()
}

/// See [`Phase::can_transition_to`].
pub fn can_transition(from: Phase, to: Phase) -> bool {
    from.can_transition_to(to)
}

/// Checks `from -> to` against the table.
pub fn validate_transition(from: Phase, to: Phase) -> Result<(), TransitionError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// Parses user input: trims surrounding whitespace and lowercases before
/// matching the canonical forms.
pub fn parse_phase(input: &str) -> Result<Phase, PhaseParseError> {
    let normalized = input.trim().to_ascii_lowercase();
    Phase::from_str(&normalized).map_err(|_| PhaseParseError {
        input: input.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EDGES: &[(Phase, Phase)] = &[
        (Phase::Planning, Phase::AwaitingApproval),
        (Phase::Planning, Phase::Error),
        (Phase::AwaitingApproval, Phase::Planning),
        (Phase::AwaitingApproval, Phase::Implementing),
        (Phase::AwaitingApproval, Phase::Error),
        (Phase::Implementing, Phase::InReview),
        (Phase::Implementing, Phase::Error),
        (Phase::InReview, Phase::Revising),
        (Phase::InReview, Phase::Completed),
        (Phase::InReview, Phase::Error),
        (Phase::Revising, Phase::InReview),
        (Phase::Revising, Phase::Error),
        (Phase::Error, Phase::Planning),
    ];

    fn any_phase() -> impl Strategy<Value = Phase> {
        prop::sample::select(Phase::ALL.to_vec())
    }

    #[test]
    fn wire_forms_are_snake_case() {
        let forms: Vec<&str> = Phase::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(
            forms,
            [
                "planning",
                "awaiting_approval",
                "implementing",
                "in_review",
                "revising",
                "completed",
                "error"
            ]
        );
        assert_eq!(Phase::InReview.to_string(), "in_review");
    }

    #[test]
    fn serde_uses_wire_form() {
        let json = serde_json::to_string(&Phase::AwaitingApproval).unwrap();
        assert_eq!(json, "\"awaiting_approval\"");
        let back: Phase = serde_json::from_str("\"in_review\"").unwrap();
        assert_eq!(back, Phase::InReview);
    }

    #[test]
    fn display_names() {
        assert_eq!(Phase::AwaitingApproval.display_name(), "Awaiting Approval");
        assert_eq!(Phase::InReview.display_name(), "In Review");
    }

    #[test]
    fn terminal_classification() {
        assert!(is_terminal(Phase::Completed));
        assert!(is_terminal(Phase::Error));
        for phase in Phase::ACTIVE {
            assert!(!phase.is_terminal(), "{phase} should be active");
        }
    }

    #[test]
    fn error_is_terminal_but_retryable() {
        assert!(Phase::Error.is_terminal());
        assert!(can_transition(Phase::Error, Phase::Planning));
        assert_eq!(Phase::Error.valid_transitions(), &[Phase::Planning]);
    }

    #[test]
    fn completed_has_no_outgoing_edges() {
        for target in Phase::ALL {
            assert!(!can_transition(Phase::Completed, target));
        }
    }

    #[test]
    fn implementing_cannot_skip_review() {
        let err = validate_transition(Phase::Implementing, Phase::Completed).unwrap_err();
        assert_eq!(err.from, Phase::Implementing);
        assert_eq!(err.to, Phase::Completed);
        assert_eq!(
            err.to_string(),
            "invalid transition from implementing to completed"
        );
    }

    #[test]
    fn is_valid_phase_is_case_sensitive() {
        assert!(is_valid_phase("in_review"));
        assert!(!is_valid_phase("In_Review"));
        assert!(!is_valid_phase(" planning"));
        assert!(!is_valid_phase(""));
    }

    #[test]
    fn parse_phase_normalizes() {
        assert_eq!(parse_phase("  PLANNING \n").unwrap(), Phase::Planning);
        assert_eq!(parse_phase("Awaiting_Approval").unwrap(), Phase::AwaitingApproval);
    }

    #[test]
    fn parse_phase_rejects_unknown_and_names_input() {
        let err = parse_phase(" Done ").unwrap_err();
        assert_eq!(err.input, " Done ");
        assert_eq!(err.to_string(), "invalid phase: \" Done \"");
        assert!(parse_phase("").is_err());
        assert!(parse_phase("in review").is_err());
    }

    proptest! {
        #[test]
        fn transition_table_matches_edge_list(from in any_phase(), to in any_phase()) {
            let listed = EDGES.contains(&(from, to));
            prop_assert_eq!(can_transition(from, to), listed);
            match validate_transition(from, to) {
                Ok(()) => prop_assert!(listed),
                Err(e) => {
                    prop_assert!(!listed);
                    prop_assert_eq!(e, TransitionError { from, to });
                }
            }
        }

        #[test]
        fn parse_accepts_any_casing_and_padding(
            phase in any_phase(),
            upper in prop::collection::vec(any::<bool>(), 0..20),
            left in "[ \t\n]{0,3}",
            right in "[ \t\n]{0,3}",
        ) {
            let cased: String = phase
                .as_str()
                .chars()
                .enumerate()
                .map(|(i, c)| if upper.get(i).copied().unwrap_or(false) { c.to_ascii_uppercase() } else { c })
                .collect();
            let input = format!("{left}{cased}{right}");
            prop_assert_eq!(parse_phase(&input).unwrap(), phase);
        }

        #[test]
        fn parse_rejects_non_phases(input in "\\PC{0,24}") {
            let normalized = input.trim().to_ascii_lowercase();
            prop_assume!(!is_valid_phase(&normalized));
            prop_assert!(parse_phase(&input).is_err());
        }
    }
}
