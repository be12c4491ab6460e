//! Orchestration half of the task dispatcher: materializes the five query-
//! layer inputs, picks a task kind (weighted random or a specific request),
//! and builds the concrete [`TaskPayload`] for it. The pure counting/weighting
//! logic lives in [`crate::availability`]; this module is the impure glue
//! around it, mirroring the donor crate's separation between the pure
//! `Aggregator` helpers and the I/O-performing coordinator.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{instrument, warn};
use uuid::Uuid;

use dendron_core::config::TreeManagerConfig;
use dendron_core::labels::{LabelTaskDisposition, LabelTaskMode};
use dendron_core::model::Role;
use dendron_core::task::{Conversation, LabelDescription, TaskPayload, TaskRequestType};

use crate::availability::{task_counts, weighted_pick, AvailabilityInputs};
use crate::error::{ManagerError, Result};
use crate::rows::ExtendibleParentRow;
use crate::store::MessageStore;

/// A built task payload plus the ids the caller needs to persist the `Task`
/// row against. The `Task` row itself is the API layer's responsibility,
/// not the dispatcher's (§4.4: "the API layer persists the task row
/// separately").
#[derive(Debug, Clone)]
pub struct DispatchedTask {
    pub payload: TaskPayload,
    pub message_tree_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
}

/// `next_task(desired, lang)`: enforce the user-enabled precondition,
/// default an empty `lang` to `"en"`, materialize availability, pick a kind,
/// and build its concrete target.
#[instrument(skip(store, config, rng))]
pub async fn next_task<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    user_id: Uuid,
    desired: TaskRequestType,
    lang: &str,
    rng: &mut impl Rng,
) -> Result<DispatchedTask> {
    if !store.is_user_enabled(user_id).await? {
        return Err(ManagerError::UserNotEnabled);
    }

    let lang_owned;
    let lang = if lang.is_empty() {
        warn!("empty lang requested, defaulting to \"en\"");
        "en"
    } else {
        lang_owned = lang.to_string();
        lang_owned.as_str()
    };

    let inputs = materialize_inputs(store, config, user_id, lang).await?;
    let counts = task_counts(&inputs, config.max_active_trees, config.rank_prompter_replies);

    let kind = if desired == TaskRequestType::Random {
        weighted_pick(&counts, rng).ok_or(ManagerError::TaskRequestedTypeNotAvailable)?
    } else {
        let available = counts.get(&desired).copied().unwrap_or(0);
        if available == 0 {
            return Err(ManagerError::TaskRequestedTypeNotAvailable);
        }
        desired
    };

    build_task(store, config, kind, lang, user_id, rng).await
}

async fn materialize_inputs<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    user_id: Uuid,
    lang: &str,
) -> Result<AvailabilityInputs> {
    let num_active_trees = store.num_active_trees(lang).await?;
    let extendible_parents_assistant = store.extendible_parents(lang, Some(Role::Assistant)).await?.len() as i64;
    let extendible_parents_prompter = store.extendible_parents(lang, Some(Role::Prompter)).await?.len() as i64;
    let prompts_need_review = store
        .prompts_need_review(lang, user_id, config.debug_allow_self_labeling)
        .await?
        .len() as i64;
    let prompter_replies_need_review = store
        .replies_need_review(lang, Some(Role::Prompter), user_id, config.debug_allow_self_labeling)
        .await?
        .len() as i64;
    let assistant_replies_need_review = store
        .replies_need_review(lang, Some(Role::Assistant), user_id, config.debug_allow_self_labeling)
        .await?
        .len() as i64;
    let incomplete_rankings_prompter = store
        .incomplete_rankings(lang, Some(Role::Prompter), config.num_required_rankings)
        .await?
        .len() as i64;
    let incomplete_rankings_assistant = store
        .incomplete_rankings(lang, Some(Role::Assistant), config.num_required_rankings)
        .await?
        .len() as i64;

    Ok(AvailabilityInputs {
        num_active_trees,
        extendible_parents_assistant,
        extendible_parents_prompter,
        prompts_need_review,
        prompter_replies_need_review,
        assistant_replies_need_review,
        incomplete_rankings_prompter,
        incomplete_rankings_assistant,
    })
}

async fn build_task<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    kind: TaskRequestType,
    lang: &str,
    user_id: Uuid,
    rng: &mut impl Rng,
) -> Result<DispatchedTask> {
    match kind {
        TaskRequestType::InitialPrompt => Ok(DispatchedTask {
            payload: TaskPayload::InitialPrompt,
            message_tree_id: None,
            parent_message_id: None,
        }),
        TaskRequestType::PrompterReply => build_reply_task(store, config, lang, Role::Assistant, rng).await,
        TaskRequestType::AssistantReply => build_reply_task(store, config, lang, Role::Prompter, rng).await,
        TaskRequestType::LabelInitialPrompt => build_label_prompt_task(store, config, lang, user_id, rng).await,
        TaskRequestType::LabelPrompterReply => {
            build_label_reply_task(store, config, lang, Role::Prompter, user_id, rng).await
        }
        TaskRequestType::LabelAssistantReply => {
            build_label_reply_task(store, config, lang, Role::Assistant, user_id, rng).await
        }
        TaskRequestType::RankPrompterReplies => build_ranking_task(store, config, lang, Role::Prompter, rng).await,
        TaskRequestType::RankAssistantReplies => build_ranking_task(store, config, lang, Role::Assistant, rng).await,
        TaskRequestType::Random => unreachable!("random resolves to a concrete kind before build_task"),
    }
}

/// `parent_role` is the role of the parent being extended (the complement of
/// the reply role that will be written): `PrompterReply` extends an
/// `assistant`-role parent, `AssistantReply` extends a `prompter`-role one.
async fn build_reply_task<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    lang: &str,
    parent_role: Role,
    rng: &mut impl Rng,
) -> Result<DispatchedTask> {
    let parents = store.extendible_parents(lang, Some(parent_role)).await?;
    let Some(chosen) = pick_reply_parent(store, config, lang, &parents, rng).await? else {
        return Err(ManagerError::TaskRequestedTypeNotAvailable);
    };

    let conversation = store.conversation_path(chosen.message_id).await?;
    let payload = match parent_role.child_role() {
        Role::Prompter => TaskPayload::PrompterReply { conversation },
        Role::Assistant => TaskPayload::AssistantReply { conversation },
    };

    Ok(DispatchedTask {
        payload,
        message_tree_id: Some(chosen.message_tree_id),
        parent_message_id: Some(chosen.message_id),
    })
}

/// Lonely-child-preferring / recency-avoiding parent selection (§4.4 REPLY).
async fn pick_reply_parent<'a, S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    lang: &str,
    parents: &'a [ExtendibleParentRow],
    rng: &mut impl Rng,
) -> Result<Option<&'a ExtendibleParentRow>> {
    if parents.is_empty() {
        return Ok(None);
    }

    let recent_parents: HashSet<Uuid> = store
        .open_reply_task_parents(lang)
        .await?
        .into_iter()
        .filter(|r| {
            let age = chrono::Utc::now().signed_duration_since(r.created_at);
            age.num_seconds() < config.recent_tasks_span_sec
        })
        .map(|r| r.parent_message_id)
        .collect();

    let lonely: Vec<&ExtendibleParentRow> = parents
        .iter()
        .filter(|p| {
            p.active_children_count > 0
                && p.active_children_count < config.lonely_children_count
                && !recent_parents.contains(&p.message_id)
        })
        .collect();

    let pool: Vec<&ExtendibleParentRow> = if !lonely.is_empty() && rng.gen_bool(config.p_lonely_child_extension) {
        lonely
    } else {
        let not_recent: Vec<&ExtendibleParentRow> =
            parents.iter().filter(|p| !recent_parents.contains(&p.message_id)).collect();
        if not_recent.is_empty() {
            parents.iter().collect()
        } else {
            not_recent
        }
    };

    Ok(pool.choose(rng).copied())
}

async fn build_label_prompt_task<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    lang: &str,
    user_id: Uuid,
    rng: &mut impl Rng,
) -> Result<DispatchedTask> {
    let candidates = store
        .prompts_need_review(lang, user_id, config.debug_allow_self_labeling)
        .await?;
    let Some(prompt) = candidates.choose(rng) else {
        return Err(ManagerError::TaskRequestedTypeNotAvailable);
    };

    let (mode, disposition, labels_in_scope) = pick_label_mode(
        rng,
        config.p_full_labeling_review_prompt,
        &config.labels_initial_prompt,
        &config.mandatory_labels_initial_prompt,
    );

    Ok(DispatchedTask {
        payload: TaskPayload::LabelInitialPrompt {
            message_id: prompt.id,
            prompt: prompt.text.clone(),
            valid_labels: config.labels_initial_prompt.clone(),
            mandatory_labels: config.mandatory_labels_initial_prompt.clone(),
            mode,
            disposition,
            labels: describe_labels(&labels_in_scope),
        },
        message_tree_id: Some(prompt.message_tree_id),
        parent_message_id: None,
    })
}

async fn build_label_reply_task<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    lang: &str,
    role: Role,
    user_id: Uuid,
    rng: &mut impl Rng,
) -> Result<DispatchedTask> {
    let candidates = store
        .replies_need_review(lang, Some(role), user_id, config.debug_allow_self_labeling)
        .await?;
    let Some(reply) = candidates.choose(rng) else {
        return Err(ManagerError::TaskRequestedTypeNotAvailable);
    };

    let (valid_labels, mandatory_labels, p_full) = match role {
        Role::Assistant => (
            &config.labels_assistant_reply,
            &config.mandatory_labels_assistant_reply,
            config.p_full_labeling_review_reply_assistant,
        ),
        Role::Prompter => (
            &config.labels_prompter_reply,
            &config.mandatory_labels_prompter_reply,
            config.p_full_labeling_review_reply_prompter,
        ),
    };

    let (mode, disposition, labels_in_scope) = pick_label_mode(rng, p_full, valid_labels, mandatory_labels);

    let conversation = match reply.parent_id {
        Some(parent_id) => store.conversation_path(parent_id).await?,
        None => Conversation::default(),
    };

    let payload = match role {
        Role::Assistant => TaskPayload::LabelAssistantReply {
            message_id: reply.id,
            conversation,
            reply: reply.text.clone(),
            valid_labels: valid_labels.clone(),
            mandatory_labels: mandatory_labels.clone(),
            mode,
            disposition,
            labels: describe_labels(&labels_in_scope),
        },
        Role::Prompter => TaskPayload::LabelPrompterReply {
            message_id: reply.id,
            conversation,
            reply: reply.text.clone(),
            valid_labels: valid_labels.clone(),
            mandatory_labels: mandatory_labels.clone(),
            mode,
            disposition,
            labels: describe_labels(&labels_in_scope),
        },
    };

    Ok(DispatchedTask {
        payload,
        message_tree_id: Some(reply.message_tree_id),
        parent_message_id: reply.parent_id,
    })
}

/// With probability `1 - p_full` emit a simple/spam-mode label set
/// (mandatory labels plus `lang_mismatch`/`quality`); otherwise the full
/// configured set.
fn pick_label_mode(
    rng: &mut impl Rng,
    p_full: f64,
    valid_labels: &[String],
    mandatory_labels: &[String],
) -> (LabelTaskMode, LabelTaskDisposition, Vec<String>) {
    if rng.gen_bool(p_full) {
        (LabelTaskMode::Full, LabelTaskDisposition::Quality, valid_labels.to_vec())
    } else {
        let mut simple = mandatory_labels.to_vec();
        for extra in ["lang_mismatch", "quality"] {
            if !simple.iter().any(|l| l == extra) {
                simple.push(extra.to_string());
            }
        }
        (LabelTaskMode::Simple, LabelTaskDisposition::Spam, simple)
    }
}

fn describe_labels(names: &[String]) -> Vec<LabelDescription> {
    names
        .iter()
        .map(|name| {
            let display_text = name.replace('_', " ");
            LabelDescription {
                name: name.clone(),
                help_text: format!("How strongly does this message exhibit \"{display_text}\"?"),
                display_text,
            }
        })
        .collect()
}

/// `ranked_role` is the role of the children being ranked (`Prompter` for
/// `RankPrompterReplies`, `Assistant` for `RankAssistantReplies`); the
/// parent's own role is the complement.
async fn build_ranking_task<S: MessageStore>(
    store: &S,
    config: &TreeManagerConfig,
    lang: &str,
    ranked_role: Role,
    rng: &mut impl Rng,
) -> Result<DispatchedTask> {
    let candidates = store
        .incomplete_rankings(lang, Some(ranked_role), config.num_required_rankings)
        .await?;
    let Some(parent_row) = candidates.choose(rng) else {
        return Err(ManagerError::TaskRequestedTypeNotAvailable);
    };

    let conversation = store.conversation_path(parent_row.message_id).await?;
    let mut children = store.children_of(parent_row.message_id).await?;
    children.retain(|c| c.review_result);
    children.shuffle(rng);

    let replies: Vec<String> = children.iter().map(|c| c.text.clone()).collect();
    let reply_message_ids: Vec<Uuid> = children.iter().map(|c| c.id).collect();

    let payload = match ranked_role {
        Role::Prompter => TaskPayload::RankPrompterReplies {
            conversation,
            replies,
            reply_message_ids,
            ranking_parent_id: parent_row.message_id,
        },
        Role::Assistant => TaskPayload::RankAssistantReplies {
            conversation,
            replies,
            reply_message_ids,
            ranking_parent_id: parent_row.message_id,
        },
    };

    Ok(DispatchedTask {
        payload,
        message_tree_id: Some(parent_row.message_tree_id),
        parent_message_id: Some(parent_row.message_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryStore;
    use chrono::Utc;
    use dendron_core::model::{Message, MessageTreeState};
    use dendron_core::state::TreeState;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn root(lang: &str, id: Uuid, user_id: Uuid) -> Message {
        Message {
            id,
            message_tree_id: id,
            parent_id: None,
            depth: 0,
            role: Role::Prompter,
            text: "P".into(),
            lang: lang.into(),
            review_count: 0,
            review_result: false,
            deleted: false,
            ranking_count: 0,
            rank: None,
            user_id,
            task_id: None,
            created_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn no_availability_errors_with_requested_type_not_available() {
        let store = InMemoryStore::new();
        let config = TreeManagerConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let err = next_task(&store, &config, Uuid::new_v4(), TaskRequestType::Random, "en", &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::TaskRequestedTypeNotAvailable));
    }

    #[tokio::test]
    async fn disabled_user_is_rejected() {
        let store = InMemoryStore::new();
        let config = TreeManagerConfig::default();
        let user_id = Uuid::new_v4();
        store.set_user_enabled(user_id, false);
        let mut rng = StdRng::seed_from_u64(1);
        let err = next_task(&store, &config, user_id, TaskRequestType::InitialPrompt, "en", &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::UserNotEnabled));
    }

    #[tokio::test]
    async fn initial_prompt_is_available_below_max_active_trees() {
        let store = InMemoryStore::new();
        let config = TreeManagerConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let dispatched = next_task(
            &store,
            &config,
            Uuid::new_v4(),
            TaskRequestType::InitialPrompt,
            "en",
            &mut rng,
        )
        .await
        .unwrap();
        assert!(matches!(dispatched.payload, TaskPayload::InitialPrompt));
    }

    #[tokio::test]
    async fn label_initial_prompt_excludes_requesting_users_own_prompt() {
        let store = InMemoryStore::new();
        let config = TreeManagerConfig::default();
        let user_id = Uuid::new_v4();
        let root_id = Uuid::new_v4();
        store.seed_message(root(&"en".to_string(), root_id, user_id));

        let mut rng = StdRng::seed_from_u64(1);
        let err = next_task(
            &store,
            &config,
            user_id,
            TaskRequestType::LabelInitialPrompt,
            "en",
            &mut rng,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ManagerError::TaskRequestedTypeNotAvailable));

        let err = next_task(
            &store,
            &config,
            Uuid::new_v4(),
            TaskRequestType::LabelInitialPrompt,
            "en",
            &mut rng,
        )
        .await;
        assert!(err.is_ok());
    }

    #[tokio::test]
    async fn lonely_child_preference_is_honored_when_probability_is_one() {
        let store = InMemoryStore::new();
        let mut config = TreeManagerConfig::default();
        config.p_lonely_child_extension = 1.0;
        config.lonely_children_count = 2;

        let tree_id = Uuid::new_v4();
        store.seed_tree_state(MessageTreeState {
            message_tree_id: tree_id,
            state: TreeState::Growing,
            active: true,
            goal_tree_size: 12,
            max_depth: 3,
            max_children_count: 3,
        });

        let mut lonely_parent = root("en", tree_id, Uuid::new_v4());
        lonely_parent.review_result = true;
        store.seed_message(lonely_parent.clone());

        // One reviewed child of the lonely parent: active_children_count == 1,
        // inside (0, lonely_children_count).
        let mut child = root("en", Uuid::new_v4(), Uuid::new_v4());
        child.message_tree_id = tree_id;
        child.parent_id = Some(tree_id);
        child.depth = 1;
        child.role = Role::Assistant;
        child.review_result = true;
        store.seed_message(child);

        // A second, fresh parent with zero children (not "lonely": 0 is excluded).
        let fresh_id = Uuid::new_v4();
        let mut fresh_parent = root("en", fresh_id, Uuid::new_v4());
        fresh_parent.review_result = true;
        store.seed_message(fresh_parent);
        store.seed_tree_state(MessageTreeState {
            message_tree_id: fresh_id,
            state: TreeState::Growing,
            active: true,
            goal_tree_size: 12,
            max_depth: 3,
            max_children_count: 3,
        });

        let mut rng = StdRng::seed_from_u64(7);
        let dispatched = next_task(
            &store,
            &config,
            Uuid::new_v4(),
            TaskRequestType::PrompterReply,
            "en",
            &mut rng,
        )
        .await
        .unwrap();
        assert_eq!(dispatched.parent_message_id, Some(tree_id));
    }
}
