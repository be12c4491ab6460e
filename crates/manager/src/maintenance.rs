//! Bulk, schedule-driven upkeep: reconciling missing tree states, retrying
//! failed scoring, activating backlog trees, and purging a user's messages.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use dendron_core::config::TreeManagerConfig;
use dendron_core::state::TreeState;

use crate::error::Result;
use crate::state_machine;
use crate::store::MessageStore;

/// For every root lacking a `MessageTreeState` row, insert one (`GROWING` if
/// the tree already has children, `INITIAL_PROMPT_REVIEW` otherwise), then
/// re-run the three advancing condition checks across every active tree in
/// those states.
#[instrument(skip(store, config, rng))]
pub async fn ensure_tree_states<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    rng: &mut impl Rng,
) -> Result<()> {
    let missing = store.missing_tree_states().await?;
    for row in missing {
        let mut tree = store.insert_default_tree_state(row.message_id).await?;
        if row.has_children {
            tree.state = TreeState::Growing;
            store.update_message_tree_state(tree).await?;
        }
    }
    run_advancing_checks(store, config, rng).await
}

async fn run_advancing_checks<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    rng: &mut impl Rng,
) -> Result<()> {
    for state in [
        TreeState::InitialPromptReview,
        TreeState::Growing,
        TreeState::Ranking,
    ] {
        for mut tree in store.trees_in_state(state).await? {
            if !tree.active {
                continue;
            }
            let Some(root) = store.get_message(tree.message_tree_id).await? else {
                continue;
            };
            state_machine::check_condition_for_growing_state(store, config, &mut tree, &root.lang, rng).await?;
            state_machine::check_condition_for_ranking_state(store, config, &mut tree, &root.lang, rng).await?;
            state_machine::check_condition_for_scoring_state(store, config, &mut tree, &root.lang, rng).await?;
        }
    }
    Ok(())
}

/// Walk every `SCORING_FAILED` tree; advance it if consensus now succeeds,
/// otherwise fall back to `active = true` / `RANKING` for another pass at
/// ranking tasks.
#[instrument(skip(store, config))]
pub async fn retry_scoring_failed_message_trees<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
) -> Result<()> {
    for mut tree in store.scoring_failed_trees().await? {
        match state_machine::attempt_scoring(store, tree.message_tree_id).await? {
            Some(scores) => {
                for (parent_id, order) in scores {
                    let siblings = store.children_of(parent_id).await?;
                    for sibling in &siblings {
                        store.set_rank(sibling.id, None).await?;
                    }
                    for (i, id) in order.iter().enumerate() {
                        store.set_rank(*id, Some(i as i32)).await?;
                    }
                }
                tree.state = TreeState::ReadyForExport;
                tree.active = false;
                store.update_message_tree_state(tree).await?;
            }
            None => {
                tree.active = true;
                tree.state = TreeState::Ranking;
                store.update_message_tree_state(tree).await?;
            }
        }
    }
    Ok(())
}

/// Pick one tree in `BACKLOG_RANKING` matching `lang` (arbitrary among
/// ties) and either move it to `RANKING` / `active = true`, or abort it to
/// `ABORTED_LOW_GRADE` if it has zero rankable parents. No-op if the
/// `p_activate_backlog_tree` roll fails and the active-ranking floor for
/// `lang` isn't breached either.
#[instrument(skip(store, config, rng))]
pub async fn activate_backlog_tree<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    lang: &str,
    rng: &mut impl Rng,
) -> Result<()> {
    let below_floor = if config.min_active_rankings_per_lang > 0 {
        let incomplete = store
            .incomplete_rankings(lang, None, config.num_required_rankings)
            .await?;
        (incomplete.len() as i64) < config.min_active_rankings_per_lang
    } else {
        false
    };

    if !rng.gen_bool(config.p_activate_backlog_tree) && !below_floor {
        return Ok(());
    }

    let Some(mut backlog_tree) = store.backlog_trees(lang).await?.into_iter().next() else {
        return Ok(());
    };

    let rankable = store
        .full_tree_including_deleted(backlog_tree.message_tree_id)
        .await?
        .iter()
        .filter(|m| !m.deleted && m.review_result)
        .count()
        >= 2;

    if rankable {
        backlog_tree.active = true;
        backlog_tree.state = TreeState::Ranking;
        store.update_message_tree_state(backlog_tree).await?;
    } else {
        backlog_tree.active = false;
        backlog_tree.state = TreeState::AbortedLowGrade;
        store.update_message_tree_state(backlog_tree).await?;
    }
    Ok(())
}

/// Hard-delete a user's messages. `purge_initial_prompts` controls whether
/// roots they authored are torn down entirely; `date_range` scopes which of
/// their messages are considered.
#[instrument(skip(store, config), fields(%user_id))]
pub async fn purge_user_messages<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    user_id: Uuid,
    purge_initial_prompts: bool,
    date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    rng: &mut impl Rng,
) -> Result<()> {
    let (roots, mut replies_by_tree) = store.partition_user_messages(user_id, date_range).await?;

    if purge_initial_prompts {
        for root_id in &roots {
            store.hard_delete_tree(*root_id).await?;
            replies_by_tree.remove(root_id);
        }
    }

    for (tree_id, bad_reply_ids) in replies_by_tree {
        purge_tree_replies(store, config, tree_id, &bad_reply_ids, rng).await?;
    }

    Ok(())
}

async fn purge_tree_replies<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    tree_id: Uuid,
    bad_reply_ids: &[Uuid],
    rng: &mut impl Rng,
) -> Result<()> {
    let mut messages = store.full_tree_including_deleted(tree_id).await?;
    messages.sort_by(|a, b| b.depth.cmp(&a.depth));

    // One O(n) pass, shallowest to deepest (messages is sorted deepest
    // first, so iterate in reverse), propagating taint from each tainted
    // parent down to its children instead of an ancestor lookup per node.
    let mut tainted: std::collections::HashSet<Uuid> = bad_reply_ids.iter().copied().collect();
    for m in messages.iter().rev() {
        if let Some(parent_id) = m.parent_id {
            if tainted.contains(&parent_id) {
                tainted.insert(m.id);
            }
        }
    }

    let mut affected_parents: std::collections::HashSet<Uuid> = std::collections::HashSet::new();
    for m in &messages {
        if tainted.contains(&m.id) {
            if let Some(parent_id) = m.parent_id {
                affected_parents.insert(parent_id);
            }
            store.hard_delete_message(m.id).await?;
        }
    }

    let parent_ids: Vec<Uuid> = affected_parents.into_iter().collect();
    store.recompute_children_counts(&parent_ids).await?;

    if let Some(mut tree) = store.get_message_tree_state(tree_id).await? {
        tree.active = true;
        tree.state = TreeState::InitialPromptReview;
        store.update_message_tree_state(tree.clone()).await?;
        let Some(root) = store.get_message(tree_id).await? else {
            return Ok(());
        };
        state_machine::check_condition_for_growing_state(store, config, &mut tree, &root.lang, rng).await?;
        state_machine::check_condition_for_ranking_state(store, config, &mut tree, &root.lang, rng).await?;
        state_machine::check_condition_for_scoring_state(store, config, &mut tree, &root.lang, rng).await?;
    }
    Ok(())
}

/// Full ban: purge the user's messages, then wipe their reactions, labels,
/// and open tasks, and disable their account.
#[instrument(skip(store, config))]
pub async fn purge_user<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    user_id: Uuid,
    rng: &mut impl Rng,
) -> Result<()> {
    purge_user_messages(store, config, user_id, true, None, rng).await?;
    store.ban_user(user_id).await?;
    warn!(%user_id, "user banned");
    Ok(())
}

/// Aggregate read model for the `stats` CLI command.
#[derive(Debug, Clone)]
pub struct TreeManagerStats {
    pub trees_by_state: HashMap<String, i64>,
    pub avg_messages_per_tree: f64,
    pub min_messages_per_tree: i64,
    pub max_messages_per_tree: i64,
}

/// Snapshot tree-state counts and message-count aggregates.
pub async fn stats<S: MessageStore>(store: &S) -> Result<TreeManagerStats> {
    let trees_by_state = store.tree_counts_by_state().await?;
    let (avg, min, max) = store.tree_message_count_stats().await?;
    info!(trees = trees_by_state.values().sum::<i64>(), "computed tree manager stats");
    Ok(TreeManagerStats {
        trees_by_state,
        avg_messages_per_tree: avg,
        min_messages_per_tree: min,
        max_messages_per_tree: max,
    })
}
