//! Ingests worker submissions (§4.5): persists them against the store and
//! nudges the state machine's condition checks. The HF embedding/toxicity
//! enrichment that follows a stored text reply is modeled as a detached
//! future (`spawn_enrichment`) so the caller never blocks the interaction
//! response on it.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use dendron_core::config::TreeManagerConfig;
use dendron_core::hf::HfClient;
use dendron_core::interaction::Interaction;
use dendron_core::model::{Message, MessageReaction, MessageTreeState, Role, TextLabels};
use dendron_core::state::TreeState;

use crate::acceptance;
use crate::error::{ManagerError, Result};
use crate::state_machine;
use crate::store::MessageStore;

/// Dispatch a worker submission to its handler and, where the design calls
/// for it, re-run the relevant condition checks before returning.
#[instrument(skip(store, config, hf, rng, interaction), fields(kind = interaction_kind(&interaction)))]
pub async fn handle_interaction<S: MessageStore, H: HfClient + 'static>(
    store: &S,
    config: &TreeManagerConfig,
    hf: &Arc<H>,
    interaction: Interaction,
    rng: &mut impl Rng,
) -> Result<()> {
    match interaction {
        Interaction::TextReplyToMessage {
            message_id,
            user_message_id,
            user_id,
            text,
            lang,
        } => handle_text_reply(store, config, hf, message_id, user_message_id, user_id, text, lang).await,
        Interaction::MessageRating {
            message_id,
            user_id,
            rating,
        } => handle_rating(store, message_id, user_id, rating).await,
        Interaction::MessageRanking {
            message_id,
            user_id,
            task_id,
            ranked_message_ids,
        } => handle_ranking(store, config, message_id, user_id, task_id, ranked_message_ids, rng).await,
        Interaction::TextLabels {
            message_id,
            user_id,
            task_id,
            labels,
        } => handle_text_labels(store, config, message_id, user_id, task_id, labels, rng).await,
    }
}

fn interaction_kind(interaction: &Interaction) -> &'static str {
    match interaction {
        Interaction::TextReplyToMessage { .. } => "text_reply_to_message",
        Interaction::MessageRating { .. } => "message_rating",
        Interaction::MessageRanking { .. } => "message_ranking",
        Interaction::TextLabels { .. } => "text_labels",
    }
}

/// Store the new message. `message_id` names the message being replied to
/// (an existing message); `user_message_id` is the id to assign the new
/// message being created. A fresh root carries `message_id == user_message_id`
/// — there being no parent to reference, the frontend points the reply at
/// itself. If the stored message has no parent, insert its default
/// `INITIAL_PROMPT_REVIEW` tree state. Once the message is visible, kicks off
/// best-effort embedding/toxicity enrichment on a detached task via
/// [`spawn_enrichment`] — never awaited here, so it can't hold up the
/// interaction response.
async fn handle_text_reply<S: MessageStore, H: HfClient + 'static>(
    store: &S,
    config: &TreeManagerConfig,
    hf: &Arc<H>,
    message_id: Uuid,
    user_message_id: Uuid,
    user_id: Uuid,
    text: String,
    lang: String,
) -> Result<()> {
    let is_root = message_id == user_message_id;
    let parent = if is_root { None } else { store.get_message(message_id).await? };
    let (parent_id, message_tree_id, depth, role) = match &parent {
        Some(p) => (Some(p.id), p.message_tree_id, p.depth + 1, p.role.child_role()),
        None => (None, user_message_id, 0, Role::Prompter),
    };
    let lang = if lang.is_empty() { "en".to_string() } else { lang };

    let message = Message {
        id: user_message_id,
        message_tree_id,
        parent_id,
        depth,
        role,
        text,
        lang,
        review_count: 0,
        review_result: false,
        deleted: false,
        ranking_count: 0,
        rank: None,
        user_id,
        task_id: None,
        created_date: Utc::now(),
    };
    let stored = store.insert_message(message).await?;

    if stored.is_root() {
        store.insert_default_tree_state(stored.id).await?;
    }

    spawn_enrichment(hf.clone(), config.clone(), stored.id, stored.text.clone());

    Ok(())
}

/// Detach [`run_enrichment`] onto its own task so the interaction response
/// never waits on it, per §4.5's "post-process asynchronously and
/// best-effort" wording for the HF embedding/toxicity calls.
fn spawn_enrichment<H: HfClient + 'static>(
    hf: Arc<H>,
    config: TreeManagerConfig,
    message_id: Uuid,
    text: String,
) {
    tokio::spawn(async move {
        run_enrichment(&*hf, &config, message_id, &text).await;
    });
}

/// Best-effort post-write enrichment: fetch an embedding and a toxicity
/// score for a just-stored text reply. Failures are logged and swallowed,
/// never surfaced to whoever awaits the interaction itself.
pub async fn run_enrichment<H: HfClient>(
    hf: &H,
    config: &TreeManagerConfig,
    message_id: Uuid,
    text: &str,
) {
    if !config.debug_skip_embedding_computation {
        if let Err(err) = hf.embed(text).await {
            error!(%message_id, %err, "embedding computation failed");
        }
    }
    if !config.debug_skip_toxicity_calculation {
        if let Err(err) = hf.classify_toxicity(text).await {
            error!(%message_id, %err, "toxicity classification failed");
        }
    }
}

/// Persist a rating. No state-machine side effect.
async fn handle_rating<S: MessageStore>(
    store: &S,
    message_id: Uuid,
    user_id: Uuid,
    rating: i32,
) -> Result<()> {
    store.insert_rating(message_id, user_id, rating).await
}

/// Persist a ranking submission, then re-run the scoring-state condition
/// check on its tree (§4.5: "persist; call `check_condition_for_scoring_state`").
async fn handle_ranking<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    message_id: Uuid,
    user_id: Uuid,
    task_id: Uuid,
    ranked_message_ids: Vec<Uuid>,
    rng: &mut impl Rng,
) -> Result<()> {
    store
        .insert_ranking(MessageReaction {
            id: Uuid::new_v4(),
            task_id,
            user_id,
            message_id,
            ranked_message_ids,
        })
        .await?;

    let Some(parent) = store.get_message(message_id).await? else {
        return Ok(());
    };
    let Some(mut tree) = store.get_message_tree_state(parent.message_tree_id).await? else {
        return Ok(());
    };
    state_machine::check_condition_for_scoring_state(store, config, &mut tree, &parent.lang, rng).await?;
    Ok(())
}

/// Persist labels. If they satisfied a task, recompute acceptance over all
/// of the subject message's reviews and, for a message that now has enough
/// reviews, apply the root-vs-reply acceptance branching of §4.5. In every
/// branch, finally re-runs the ranking-state condition check.
async fn handle_text_labels<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    message_id: Uuid,
    user_id: Uuid,
    task_id: Option<Uuid>,
    labels: std::collections::HashMap<String, f64>,
    rng: &mut impl Rng,
) -> Result<()> {
    store
        .insert_text_labels(TextLabels {
            id: Uuid::new_v4(),
            message_id,
            user_id,
            task_id,
            labels,
        })
        .await?;

    let Some(message) = store.get_message(message_id).await? else {
        return Ok(());
    };

    if task_id.is_none() {
        return Ok(());
    }

    let review_count = store.increment_review_count(message_id).await?;
    let all_labels = store.labels_for_message(message_id).await?;

    if message.is_root() {
        if review_count >= config.num_reviews_initial_prompt {
            let accepted = acceptance::accept(
                &all_labels,
                config.acceptance_threshold_initial_prompt,
                config.num_reviews_initial_prompt,
            );
            let Some(mut tree) = store.get_message_tree_state(message.message_tree_id).await? else {
                return Ok(());
            };
            if accepted {
                store.set_review_result(message_id, true).await?;
                state_machine::check_condition_for_growing_state(
                    store,
                    config,
                    &mut tree,
                    &message.lang,
                    rng,
                )
                .await?;
            } else {
                state_machine::enter_low_grade_state(store, config, &mut tree, &message.lang, rng).await?;
            }
        }
    } else if review_count >= config.num_reviews_reply {
        let accepted = acceptance::accept(
            &all_labels,
            config.acceptance_threshold_reply,
            config.num_reviews_reply,
        );
        if accepted {
            store.set_review_result(message_id, true).await?;
        }
    }

    run_ranking_state_check(store, config, message.message_tree_id, &message.lang, rng).await
}

/// Re-run the `GROWING -> RANKING` condition check on a tree (§4.5's final
/// step of the `TextLabels` branch).
async fn run_ranking_state_check<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    message_tree_id: Uuid,
    lang: &str,
    rng: &mut impl Rng,
) -> Result<()> {
    let Some(mut tree) = store.get_message_tree_state(message_tree_id).await? else {
        return Ok(());
    };
    state_machine::check_condition_for_ranking_state(store, config, &mut tree, lang, rng).await?;
    Ok(())
}

/// Surface an unrecognized submission as the spec's dedicated error kind
/// rather than a generic validation failure. Only reachable from a caller
/// deserializing a raw, untagged payload into [`Interaction`] by hand (the
/// typed `#[serde(tag = "kind")]` enum already rejects unknown kinds at the
/// deserialization boundary for ordinary callers).
pub fn reject_unknown_kind() -> ManagerError {
    warn!("interaction submission did not match any known kind");
    ManagerError::TaskInvalidResponseType
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hf_client::NoopHfClient;
    use crate::in_memory::InMemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn labels(spam: f64, lang_mismatch: f64) -> HashMap<String, f64> {
        let mut m = HashMap::new();
        m.insert("spam".to_string(), spam);
        m.insert("lang_mismatch".to_string(), lang_mismatch);
        m
    }

    #[tokio::test]
    async fn text_reply_with_no_parent_becomes_a_root_in_initial_prompt_review() {
        let store = InMemoryStore::new();
        let config = TreeManagerConfig::default();
        let hf = Arc::new(NoopHfClient);
        let mut rng = StdRng::seed_from_u64(1);
        let message_id = Uuid::new_v4();

        handle_interaction(
            &store,
            &config,
            &hf,
            Interaction::TextReplyToMessage {
                message_id,
                user_message_id: message_id,
                user_id: Uuid::new_v4(),
                text: "P".into(),
                lang: "en".into(),
            },
            &mut rng,
        )
        .await
        .unwrap();

        let tree = store.get_message_tree_state(message_id).await.unwrap().unwrap();
        assert_eq!(tree.state, TreeState::InitialPromptReview);
        let stored = store.get_message(message_id).await.unwrap().unwrap();
        assert!(stored.is_root());
        assert_eq!(stored.role, Role::Prompter);
    }

    #[tokio::test]
    async fn accepted_root_labels_advance_to_growing() {
        let store = InMemoryStore::new();
        let mut config = TreeManagerConfig::default();
        config.num_reviews_initial_prompt = 1;
        let hf = Arc::new(NoopHfClient);
        let mut rng = StdRng::seed_from_u64(1);
        let root_id = Uuid::new_v4();

        handle_interaction(
            &store,
            &config,
            &hf,
            Interaction::TextReplyToMessage {
                message_id: root_id,
                user_message_id: root_id,
                user_id: Uuid::new_v4(),
                text: "P".into(),
                lang: "en".into(),
            },
            &mut rng,
        )
        .await
        .unwrap();

        handle_interaction(
            &store,
            &config,
            &hf,
            Interaction::TextLabels {
                message_id: root_id,
                user_id: Uuid::new_v4(),
                task_id: Some(Uuid::new_v4()),
                labels: labels(0.0, 0.0),
            },
            &mut rng,
        )
        .await
        .unwrap();

        let tree = store.get_message_tree_state(root_id).await.unwrap().unwrap();
        assert_eq!(tree.state, TreeState::Growing);
    }

    #[tokio::test]
    async fn low_grade_root_labels_abort_the_tree() {
        let store = InMemoryStore::new();
        let mut config = TreeManagerConfig::default();
        config.num_reviews_initial_prompt = 1;
        let hf = Arc::new(NoopHfClient);
        let mut rng = StdRng::seed_from_u64(1);
        let root_id = Uuid::new_v4();

        handle_interaction(
            &store,
            &config,
            &hf,
            Interaction::TextReplyToMessage {
                message_id: root_id,
                user_message_id: root_id,
                user_id: Uuid::new_v4(),
                text: "P".into(),
                lang: "en".into(),
            },
            &mut rng,
        )
        .await
        .unwrap();

        handle_interaction(
            &store,
            &config,
            &hf,
            Interaction::TextLabels {
                message_id: root_id,
                user_id: Uuid::new_v4(),
                task_id: Some(Uuid::new_v4()),
                labels: labels(1.0, 0.0),
            },
            &mut rng,
        )
        .await
        .unwrap();

        let tree = store.get_message_tree_state(root_id).await.unwrap().unwrap();
        assert_eq!(tree.state, TreeState::AbortedLowGrade);
        assert!(!tree.active);
    }

    #[tokio::test]
    async fn ranking_submission_triggers_scoring_check() {
        let store = InMemoryStore::new();
        let config = TreeManagerConfig::default();
        let hf = Arc::new(NoopHfClient);
        let mut rng = StdRng::seed_from_u64(1);

        let tree_id = Uuid::new_v4();
        store.seed_tree_state(MessageTreeState {
            message_tree_id: tree_id,
            state: TreeState::Ranking,
            active: true,
            goal_tree_size: 4,
            max_depth: 3,
            max_children_count: 2,
        });
        let parent = Message {
            id: tree_id,
            message_tree_id: tree_id,
            parent_id: None,
            depth: 0,
            role: Role::Prompter,
            text: "P".into(),
            lang: "en".into(),
            review_count: 3,
            review_result: true,
            deleted: false,
            ranking_count: 0,
            rank: None,
            user_id: Uuid::new_v4(),
            task_id: None,
            created_date: Utc::now(),
        };
        store.seed_message(parent.clone());

        let a1 = Uuid::new_v4();
        let a2 = Uuid::new_v4();
        for id in [a1, a2] {
            let mut child = parent.clone();
            child.id = id;
            child.parent_id = Some(tree_id);
            child.depth = 1;
            child.role = Role::Assistant;
            child.review_result = true;
            store.seed_message(child);
        }

        for _ in 0..3 {
            handle_interaction(
                &store,
                &config,
                &hf,
                Interaction::MessageRanking {
                    message_id: tree_id,
                    user_id: Uuid::new_v4(),
                    task_id: Uuid::new_v4(),
                    ranked_message_ids: vec![a1, a2],
                },
                &mut rng,
            )
            .await
            .unwrap();
        }

        let tree = store.get_message_tree_state(tree_id).await.unwrap().unwrap();
        assert_eq!(tree.state, TreeState::ReadyForExport);
        let ranked_a1 = store.get_message(a1).await.unwrap().unwrap();
        let ranked_a2 = store.get_message(a2).await.unwrap().unwrap();
        assert_eq!(ranked_a1.rank, Some(0));
        assert_eq!(ranked_a2.rank, Some(1));
    }
}
