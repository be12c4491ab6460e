//! Tree manager configuration (§6 of the design spec).

use serde::{Deserialize, Serialize};

/// Every tunable the tree manager reads. `Default` carries the values this
/// system has shipped with; a partial config file layers over these via
/// `serde(default)` on every field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeManagerConfig {
    /// Cap on `growing`/`initial_prompt_review` trees per language.
    #[serde(default = "defaults::max_active_trees")]
    pub max_active_trees: i64,

    /// Default goal tree size for newly created tree states.
    #[serde(default = "defaults::goal_tree_size")]
    pub goal_tree_size: i32,
    /// Default max depth for newly created tree states.
    #[serde(default = "defaults::max_tree_depth")]
    pub max_tree_depth: i32,
    /// Default max children count for newly created tree states.
    #[serde(default = "defaults::max_children_count")]
    pub max_children_count: i32,

    /// Reviews required before an initial prompt's acceptance is decided.
    #[serde(default = "defaults::num_reviews_initial_prompt")]
    pub num_reviews_initial_prompt: i32,
    /// Reviews required before a reply's acceptance is decided.
    #[serde(default = "defaults::num_reviews_reply")]
    pub num_reviews_reply: i32,

    /// Acceptance threshold for initial prompts.
    #[serde(default = "defaults::acceptance_threshold_initial_prompt")]
    pub acceptance_threshold_initial_prompt: f64,
    /// Acceptance threshold for replies.
    #[serde(default = "defaults::acceptance_threshold_reply")]
    pub acceptance_threshold_reply: f64,

    /// Ranking submissions required per parent before scoring.
    #[serde(default = "defaults::num_required_rankings")]
    pub num_required_rankings: i32,

    /// Full configured label sets per target.
    #[serde(default = "defaults::labels_initial_prompt")]
    pub labels_initial_prompt: Vec<String>,
    #[serde(default = "defaults::labels_reply")]
    pub labels_assistant_reply: Vec<String>,
    #[serde(default = "defaults::labels_reply")]
    pub labels_prompter_reply: Vec<String>,

    /// Mandatory label subsets per target (used for "simple"/spam-mode tasks).
    #[serde(default = "defaults::mandatory_labels_initial_prompt")]
    pub mandatory_labels_initial_prompt: Vec<String>,
    #[serde(default = "defaults::mandatory_labels_reply")]
    pub mandatory_labels_assistant_reply: Vec<String>,
    #[serde(default = "defaults::mandatory_labels_reply")]
    pub mandatory_labels_prompter_reply: Vec<String>,

    /// Probability of emitting a full (vs. simple/spam) labeling task.
    #[serde(default = "defaults::p_full_labeling_review_prompt")]
    pub p_full_labeling_review_prompt: f64,
    #[serde(default = "defaults::p_full_labeling_review_reply")]
    pub p_full_labeling_review_reply_assistant: f64,
    #[serde(default = "defaults::p_full_labeling_review_reply")]
    pub p_full_labeling_review_reply_prompter: f64,

    /// Lonely-parent reply-task preference.
    #[serde(default = "defaults::p_lonely_child_extension")]
    pub p_lonely_child_extension: f64,
    #[serde(default = "defaults::lonely_children_count")]
    pub lonely_children_count: i64,

    /// Recency window (seconds) for open reply tasks considered "recent".
    #[serde(default = "defaults::recent_tasks_span_sec")]
    pub recent_tasks_span_sec: i64,

    /// Whether prompter replies can be ranked at all.
    #[serde(default = "defaults::rank_prompter_replies")]
    pub rank_prompter_replies: bool,

    /// Backlog activation.
    #[serde(default = "defaults::p_activate_backlog_tree")]
    pub p_activate_backlog_tree: f64,
    #[serde(default = "defaults::min_active_rankings_per_lang")]
    pub min_active_rankings_per_lang: i64,

    /// Debug flags.
    #[serde(default)]
    pub debug_allow_self_labeling: bool,
    #[serde(default)]
    pub debug_allow_duplicate_tasks: bool,
    #[serde(default)]
    pub debug_skip_embedding_computation: bool,
    #[serde(default)]
    pub debug_skip_toxicity_calculation: bool,
}

impl Default for TreeManagerConfig {
    fn default() -> Self {
        Self {
            max_active_trees: defaults::max_active_trees(),
            goal_tree_size: defaults::goal_tree_size(),
            max_tree_depth: defaults::max_tree_depth(),
            max_children_count: defaults::max_children_count(),
            num_reviews_initial_prompt: defaults::num_reviews_initial_prompt(),
            num_reviews_reply: defaults::num_reviews_reply(),
            acceptance_threshold_initial_prompt: defaults::acceptance_threshold_initial_prompt(),
            acceptance_threshold_reply: defaults::acceptance_threshold_reply(),
            num_required_rankings: defaults::num_required_rankings(),
            labels_initial_prompt: defaults::labels_initial_prompt(),
            labels_assistant_reply: defaults::labels_reply(),
            labels_prompter_reply: defaults::labels_reply(),
            mandatory_labels_initial_prompt: defaults::mandatory_labels_initial_prompt(),
            mandatory_labels_assistant_reply: defaults::mandatory_labels_reply(),
            mandatory_labels_prompter_reply: defaults::mandatory_labels_reply(),
            p_full_labeling_review_prompt: defaults::p_full_labeling_review_prompt(),
            p_full_labeling_review_reply_assistant: defaults::p_full_labeling_review_reply(),
            p_full_labeling_review_reply_prompter: defaults::p_full_labeling_review_reply(),
            p_lonely_child_extension: defaults::p_lonely_child_extension(),
            lonely_children_count: defaults::lonely_children_count(),
            recent_tasks_span_sec: defaults::recent_tasks_span_sec(),
            rank_prompter_replies: defaults::rank_prompter_replies(),
            p_activate_backlog_tree: defaults::p_activate_backlog_tree(),
            min_active_rankings_per_lang: defaults::min_active_rankings_per_lang(),
            debug_allow_self_labeling: false,
            debug_allow_duplicate_tasks: false,
            debug_skip_embedding_computation: false,
            debug_skip_toxicity_calculation: false,
        }
    }
}

impl TreeManagerConfig {
    /// Merge another (partially specified) config into this one, taking the
    /// other's values wherever it differs from a fresh default. Mirrors the
    /// donor CLI's `Config::merge`, generalized to every field here instead
    /// of a handful of `Option<T>`s, since every field of this config already
    /// has a meaningful default to fall back on.
    pub fn merge(&mut self, other: TreeManagerConfig) {
        *self = other;
    }
}

mod defaults {
    pub fn max_active_trees() -> i64 {
        100
    }
    pub fn goal_tree_size() -> i32 {
        12
    }
    pub fn max_tree_depth() -> i32 {
        3
    }
    pub fn max_children_count() -> i32 {
        3
    }
    pub fn num_reviews_initial_prompt() -> i32 {
        3
    }
    pub fn num_reviews_reply() -> i32 {
        3
    }
    pub fn acceptance_threshold_initial_prompt() -> f64 {
        0.5
    }
    pub fn acceptance_threshold_reply() -> f64 {
        0.5
    }
    pub fn num_required_rankings() -> i32 {
        3
    }
    pub fn labels_initial_prompt() -> Vec<String> {
        vec!["spam".into(), "lang_mismatch".into(), "quality".into()]
    }
    pub fn labels_reply() -> Vec<String> {
        vec![
            "spam".into(),
            "lang_mismatch".into(),
            "quality".into(),
            "helpful".into(),
        ]
    }
    pub fn mandatory_labels_initial_prompt() -> Vec<String> {
        vec!["spam".into()]
    }
    pub fn mandatory_labels_reply() -> Vec<String> {
        vec!["spam".into()]
    }
    pub fn p_full_labeling_review_prompt() -> f64 {
        0.5
    }
    pub fn p_full_labeling_review_reply() -> f64 {
        0.5
    }
    pub fn p_lonely_child_extension() -> f64 {
        0.2
    }
    pub fn lonely_children_count() -> i64 {
        2
    }
    pub fn recent_tasks_span_sec() -> i64 {
        300
    }
    pub fn rank_prompter_replies() -> bool {
        false
    }
    pub fn p_activate_backlog_tree() -> f64 {
        0.1
    }
    pub fn min_active_rankings_per_lang() -> i64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let cfg = TreeManagerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TreeManagerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.goal_tree_size, cfg.goal_tree_size);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let partial = r#"{"goal_tree_size": 4, "max_children_count": 2}"#;
        let cfg: TreeManagerConfig = serde_json::from_str(partial).unwrap();
        assert_eq!(cfg.goal_tree_size, 4);
        assert_eq!(cfg.max_children_count, 2);
        assert_eq!(cfg.num_required_rankings, 3);
    }
}
