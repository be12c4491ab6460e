//! Pure task-availability counting and the weighted random task-kind picker.
//!
//! Both functions take already-materialized query results rather than doing
//! any I/O themselves, mirroring the donor crate's separation between
//! `Aggregator`'s pure selection helpers and the coordinator that fetches
//! the inputs they consume.

use std::collections::HashMap;

use dendron_core::task::TaskRequestType;
use rand::Rng;

/// The five already-materialized inputs the availability table is computed
/// from (§4.4 of the design).
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityInputs {
    /// Trees currently in `GROWING`/`INITIAL_PROMPT_REVIEW` for this language.
    pub num_active_trees: i64,
    /// Extendible parents with role `assistant` (candidates for a prompter reply).
    pub extendible_parents_assistant: i64,
    /// Extendible parents with role `prompter` (candidates for an assistant reply).
    pub extendible_parents_prompter: i64,
    /// Prompts awaiting review.
    pub prompts_need_review: i64,
    /// Replies awaiting review, role `prompter`.
    pub prompter_replies_need_review: i64,
    /// Replies awaiting review, role `assistant`.
    pub assistant_replies_need_review: i64,
    /// Incomplete-ranking parents, role `prompter`.
    pub incomplete_rankings_prompter: i64,
    /// Incomplete-ranking parents, role `assistant`.
    pub incomplete_rankings_assistant: i64,
}

/// Compute per-kind availability counts, `RANDOM` excluded (summed by the
/// caller when needed) plus every specific [`TaskRequestType`].
pub fn task_counts(
    inputs: &AvailabilityInputs,
    max_active_trees: i64,
    rank_prompter_replies_enabled: bool,
) -> HashMap<TaskRequestType, usize> {
    let mut counts = HashMap::new();

    let initial_prompt = (max_active_trees - inputs.num_active_trees).max(0) as usize;
    counts.insert(TaskRequestType::InitialPrompt, initial_prompt);
    counts.insert(
        TaskRequestType::PrompterReply,
        inputs.extendible_parents_assistant.max(0) as usize,
    );
    counts.insert(
        TaskRequestType::AssistantReply,
        inputs.extendible_parents_prompter.max(0) as usize,
    );
    counts.insert(
        TaskRequestType::LabelInitialPrompt,
        inputs.prompts_need_review.max(0) as usize,
    );
    counts.insert(
        TaskRequestType::LabelPrompterReply,
        inputs.prompter_replies_need_review.max(0) as usize,
    );
    counts.insert(
        TaskRequestType::LabelAssistantReply,
        inputs.assistant_replies_need_review.max(0) as usize,
    );
    counts.insert(
        TaskRequestType::RankPrompterReplies,
        if rank_prompter_replies_enabled {
            inputs.incomplete_rankings_prompter.max(0) as usize
        } else {
            0
        },
    );
    counts.insert(
        TaskRequestType::RankAssistantReplies,
        inputs.incomplete_rankings_assistant.max(0) as usize,
    );

    counts
}

/// Weight of each task kind in the random draw. Kinds not in this table
/// (`initial_prompt`) fall back to the PROMPT weight.
fn weight_of(kind: TaskRequestType) -> u32 {
    match kind {
        TaskRequestType::RankPrompterReplies | TaskRequestType::RankAssistantReplies => 10,
        TaskRequestType::LabelPrompterReply | TaskRequestType::LabelAssistantReply => 5,
        TaskRequestType::LabelInitialPrompt => 5,
        TaskRequestType::PrompterReply | TaskRequestType::AssistantReply => 2,
        TaskRequestType::InitialPrompt => 1,
        TaskRequestType::Random => 0,
    }
}

/// Weighted-random pick among kinds with nonzero availability. `None` if
/// every weight is zero. The RNG is injected so dispatcher tests can be
/// deterministic.
pub fn weighted_pick<R: Rng>(
    counts: &HashMap<TaskRequestType, usize>,
    rng: &mut R,
) -> Option<TaskRequestType> {
    let weighted: Vec<(TaskRequestType, u32)> = counts
        .iter()
        .filter(|(_, &count)| count > 0)
        .map(|(&kind, _)| (kind, weight_of(kind)))
        .filter(|(_, w)| *w > 0)
        .collect();

    let total: u32 = weighted.iter().map(|(_, w)| w).sum();
    if total == 0 {
        return None;
    }

    let mut draw = rng.gen_range(0..total);
    let mut kinds = weighted;
    kinds.sort_by_key(|(kind, _)| format!("{kind:?}"));
    for (kind, weight) in kinds {
        if draw < weight {
            return Some(kind);
        }
        draw -= weight;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn sample_inputs() -> AvailabilityInputs {
        AvailabilityInputs {
            num_active_trees: 2,
            extendible_parents_assistant: 3,
            extendible_parents_prompter: 0,
            prompts_need_review: 1,
            prompter_replies_need_review: 0,
            assistant_replies_need_review: 4,
            incomplete_rankings_prompter: 0,
            incomplete_rankings_assistant: 2,
        }
    }

    #[test]
    fn initial_prompt_caps_at_zero() {
        let counts = task_counts(&sample_inputs(), 2, true);
        assert_eq!(counts[&TaskRequestType::InitialPrompt], 0);
    }

    #[test]
    fn respects_rank_prompter_replies_flag() {
        let mut inputs = sample_inputs();
        inputs.incomplete_rankings_prompter = 5;
        let enabled = task_counts(&inputs, 2, true);
        let disabled = task_counts(&inputs, 2, false);
        assert_eq!(enabled[&TaskRequestType::RankPrompterReplies], 5);
        assert_eq!(disabled[&TaskRequestType::RankPrompterReplies], 0);
    }

    #[test]
    fn dispatch_is_idempotent_without_mutation() {
        let inputs = sample_inputs();
        let first = task_counts(&inputs, 10, true);
        let second = task_counts(&inputs, 10, true);
        assert_eq!(first, second);
    }

    #[test]
    fn all_zero_availability_yields_none() {
        let counts: HashMap<TaskRequestType, usize> = HashMap::new();
        let mut rng = StepRng::new(0, 1);
        assert_eq!(weighted_pick(&counts, &mut rng), None);
    }

    #[test]
    fn only_nonzero_kind_is_always_picked() {
        let mut counts = HashMap::new();
        counts.insert(TaskRequestType::InitialPrompt, 1);
        let mut rng = StepRng::new(0, 1);
        assert_eq!(weighted_pick(&counts, &mut rng), Some(TaskRequestType::InitialPrompt));
    }
}
