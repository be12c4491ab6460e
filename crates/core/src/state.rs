//! Tree life-cycle states.

use serde::{Deserialize, Serialize};

/// The state of a `MessageTreeState` row (one per root message).
///
/// `ReadyForExport`, `AbortedLowGrade`, and `HaltedByModerator` are terminal:
/// once entered, `MessageTreeState::active` is forced to `false` and no
/// further transition is defined for them in this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeState {
    InitialPromptReview,
    Growing,
    BacklogRanking,
    Ranking,
    ReadyForScoring,
    ScoringFailed,
    ReadyForExport,
    AbortedLowGrade,
    HaltedByModerator,
}

/// States from which no further transition is defined.
pub const TERMINAL_STATES: &[TreeState] = &[
    TreeState::ReadyForExport,
    TreeState::AbortedLowGrade,
    TreeState::HaltedByModerator,
];

impl TreeState {
    /// Whether this state is terminal (entering it forces `active = false`).
    pub fn is_terminal(self) -> bool {
        TERMINAL_STATES.contains(&self)
    }

    /// The lowercase wire representation used by the store.
    pub fn as_str(self) -> &'static str {
        match self {
            TreeState::InitialPromptReview => "initial_prompt_review",
            TreeState::Growing => "growing",
            TreeState::BacklogRanking => "backlog_ranking",
            TreeState::Ranking => "ranking",
            TreeState::ReadyForScoring => "ready_for_scoring",
            TreeState::ScoringFailed => "scoring_failed",
            TreeState::ReadyForExport => "ready_for_export",
            TreeState::AbortedLowGrade => "aborted_low_grade",
            TreeState::HaltedByModerator => "halted_by_moderator",
        }
    }
}

/// Error returned when parsing an unrecognized tree state string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tree state '{0}'")]
pub struct ParseTreeStateError(pub String);

impl std::str::FromStr for TreeState {
    type Err = ParseTreeStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial_prompt_review" => Ok(TreeState::InitialPromptReview),
            "growing" => Ok(TreeState::Growing),
            "backlog_ranking" => Ok(TreeState::BacklogRanking),
            "ranking" => Ok(TreeState::Ranking),
            "ready_for_scoring" => Ok(TreeState::ReadyForScoring),
            "scoring_failed" => Ok(TreeState::ScoringFailed),
            "ready_for_export" => Ok(TreeState::ReadyForExport),
            "aborted_low_grade" => Ok(TreeState::AbortedLowGrade),
            "halted_by_moderator" => Ok(TreeState::HaltedByModerator),
            other => Err(ParseTreeStateError(other.to_string())),
        }
    }
}

impl std::fmt::Display for TreeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_exactly_three() {
        assert_eq!(TERMINAL_STATES.len(), 3);
        assert!(TreeState::ReadyForExport.is_terminal());
        assert!(TreeState::AbortedLowGrade.is_terminal());
        assert!(TreeState::HaltedByModerator.is_terminal());
        assert!(!TreeState::Growing.is_terminal());
        assert!(!TreeState::Ranking.is_terminal());
    }

    #[test]
    fn serde_round_trip_is_snake_case() {
        let s = serde_json::to_string(&TreeState::InitialPromptReview).unwrap();
        assert_eq!(s, "\"initial_prompt_review\"");
        let back: TreeState = serde_json::from_str(&s).unwrap();
        assert_eq!(back, TreeState::InitialPromptReview);
    }

    #[test]
    fn from_str_round_trips_with_as_str() {
        use std::str::FromStr;
        for state in [
            TreeState::InitialPromptReview,
            TreeState::Growing,
            TreeState::BacklogRanking,
            TreeState::Ranking,
            TreeState::ReadyForScoring,
            TreeState::ScoringFailed,
            TreeState::ReadyForExport,
            TreeState::AbortedLowGrade,
            TreeState::HaltedByModerator,
        ] {
            assert_eq!(TreeState::from_str(state.as_str()).unwrap(), state);
        }
        assert!(TreeState::from_str("not_a_state").is_err());
    }
}
