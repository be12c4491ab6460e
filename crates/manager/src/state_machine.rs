//! Advances a tree across states as its condition-check guards pass.
//! Each `check_condition_for_*` function is idempotent: calling it twice in
//! a row from the same starting fixture yields the same final state.

use std::collections::HashMap;

use rand::Rng;
use tracing::{info, instrument};
use uuid::Uuid;

use dendron_core::config::TreeManagerConfig;
use dendron_core::model::MessageTreeState;
use dendron_core::state::TreeState;

use crate::consensus::ranked_pairs;
use crate::error::Result;
use crate::maintenance;
use crate::store::MessageStore;

/// Transition `tree` to `target`, persisting the new state. Entering a
/// terminal state forces `active = false`; any other target leaves `active`
/// untouched (callers that need to flip it do so before calling this).
/// On terminal entry from a previously-active tree, rolls the backlog
/// activation dice for `lang`.
#[instrument(skip(store, config, tree, rng))]
pub async fn enter_state<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    tree: &mut MessageTreeState,
    target: TreeState,
    lang: &str,
    rng: &mut impl Rng,
) -> Result<()> {
    let was_active = tree.active;
    tree.state = target;
    if target.is_terminal() {
        tree.active = false;
    }
    store.update_message_tree_state(tree.clone()).await?;
    info!(message_tree_id = %tree.message_tree_id, %target, "tree entered state");

    if target.is_terminal() && was_active {
        maintenance::activate_backlog_tree(store, config, lang, rng).await?;
    }
    Ok(())
}

/// `INITIAL_PROMPT_REVIEW -> GROWING` once the root has passed review.
pub async fn check_condition_for_growing_state<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    tree: &mut MessageTreeState,
    lang: &str,
    rng: &mut impl Rng,
) -> Result<bool> {
    if tree.state != TreeState::InitialPromptReview {
        return Ok(false);
    }
    let Some(root) = store.get_message(tree.message_tree_id).await? else {
        return Ok(false);
    };
    if !root.review_result {
        return Ok(false);
    }
    enter_state(store, config, tree, TreeState::Growing, lang, rng).await?;
    Ok(true)
}

/// `INITIAL_PROMPT_REVIEW -> ABORTED_LOW_GRADE`. Called directly by the
/// interaction handler once it has decided the root's accumulated reviews
/// don't clear the acceptance bar; no further guard to check here.
pub async fn enter_low_grade_state<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    tree: &mut MessageTreeState,
    lang: &str,
    rng: &mut impl Rng,
) -> Result<bool> {
    if tree.state != TreeState::InitialPromptReview {
        return Ok(false);
    }
    enter_state(store, config, tree, TreeState::AbortedLowGrade, lang, rng).await?;
    Ok(true)
}

/// `GROWING -> RANKING` once the tree has reached its goal size with
/// nothing left awaiting review.
pub async fn check_condition_for_ranking_state<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    tree: &mut MessageTreeState,
    lang: &str,
    rng: &mut impl Rng,
) -> Result<bool> {
    if tree.state != TreeState::Growing {
        return Ok(false);
    }
    let size = store.tree_size(tree.message_tree_id).await?;
    if size.remaining_messages != 0 || size.awaiting_review != 0 {
        return Ok(false);
    }
    enter_state(store, config, tree, TreeState::Ranking, lang, rng).await?;
    Ok(true)
}

/// `RANKING -> READY_FOR_SCORING` once every qualifying parent has quorum,
/// then immediately attempts consensus scoring (`READY_FOR_SCORING ->
/// READY_FOR_EXPORT` or `SCORING_FAILED`). Also the re-entry point for a
/// tree already sitting in `READY_FOR_SCORING` or `SCORING_FAILED` — the
/// `SCORING_FAILED` branch bypasses the state-matching guard above it is
/// normally paired with, since retrying is exactly what that state is for.
pub async fn check_condition_for_scoring_state<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    tree: &mut MessageTreeState,
    lang: &str,
    rng: &mut impl Rng,
) -> Result<bool> {
    match tree.state {
        TreeState::Ranking => {
            if !ranking_quorum_met(store, config, tree.message_tree_id, lang).await? {
                return Ok(false);
            }
            enter_state(store, config, tree, TreeState::ReadyForScoring, lang, rng).await?;
            attempt_and_apply_scoring(store, config, tree, lang, rng).await?;
            Ok(true)
        }
        TreeState::ReadyForScoring | TreeState::ScoringFailed => {
            attempt_and_apply_scoring(store, config, tree, lang, rng).await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

async fn ranking_quorum_met<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    message_tree_id: Uuid,
    lang: &str,
) -> Result<bool> {
    let incomplete = store
        .incomplete_rankings(lang, None, config.num_required_rankings)
        .await?;
    Ok(!incomplete
        .iter()
        .any(|row| row.message_tree_id == message_tree_id))
}

/// Run [`attempt_scoring`] and move the tree to `READY_FOR_EXPORT` or
/// `SCORING_FAILED` depending on the outcome, applying ranks on success.
async fn attempt_and_apply_scoring<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    tree: &mut MessageTreeState,
    lang: &str,
    rng: &mut impl Rng,
) -> Result<()> {
    match attempt_scoring(store, tree.message_tree_id).await? {
        Some(scores) => {
            for (parent_id, order) in scores {
                apply_consensus(store, parent_id, &order).await?;
            }
            enter_state(store, config, tree, TreeState::ReadyForExport, lang, rng).await?;
        }
        None => {
            enter_state(store, config, tree, TreeState::ScoringFailed, lang, rng).await?;
        }
    }
    Ok(())
}

/// Compute ranked-pairs consensus for every eligible parent (non-deleted,
/// reviewed, with >=2 reviewed non-deleted children) in `message_tree_id`.
/// Returns `None` if any eligible parent's submissions don't yield a total
/// order (the "consensus computation threw" case), `Some` of the per-parent
/// orders otherwise. Shared by the normal scoring-state check and by
/// `maintenance::retry_scoring_failed_message_trees`, which needs to
/// distinguish success from failure without `enter_state`'s side effects.
pub(crate) async fn attempt_scoring<S: MessageStore>(
    store: &S,
    message_tree_id: Uuid,
) -> Result<Option<Vec<(Uuid, Vec<Uuid>)>>> {
    let messages = store.full_tree_including_deleted(message_tree_id).await?;

    let mut children_count: HashMap<Uuid, usize> = HashMap::new();
    for m in &messages {
        if let Some(parent_id) = m.parent_id {
            if !m.deleted && m.review_result {
                *children_count.entry(parent_id).or_insert(0) += 1;
            }
        }
    }

    let eligible: Vec<Uuid> = messages
        .iter()
        .filter(|m| !m.deleted && m.review_result)
        .filter(|m| children_count.get(&m.id).copied().unwrap_or(0) >= 2)
        .map(|m| m.id)
        .collect();

    let mut scores = Vec::with_capacity(eligible.len());
    for parent_id in eligible {
        let result = store.tree_ranking_results(parent_id).await?;
        match ranked_pairs(&result.orderings) {
            Some(order) => scores.push((parent_id, order)),
            None => return Ok(None),
        }
    }
    Ok(Some(scores))
}

/// Null every sibling's rank, then set `rank = i` for each id in `order`.
async fn apply_consensus<S: MessageStore>(store: &S, parent_id: Uuid, order: &[Uuid]) -> Result<()> {
    let siblings = store.children_of(parent_id).await?;
    for sibling in &siblings {
        store.set_rank(sibling.id, None).await?;
    }
    for (i, id) in order.iter().enumerate() {
        store.set_rank(*id, Some(i as i32)).await?;
    }
    Ok(())
}
