//! An in-process `MessageStore` used by tests that exercise the dispatcher,
//! interaction handler, and state machine together without a live Postgres
//! instance (§ ambient test tooling). Filter semantics mirror `PgStore`'s SQL
//! exactly; this is a second, independent rendering of the same query-layer
//! contract, not a wrapper around it.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use dendron_core::model::{Message, MessageReaction, MessageTreeState, Role, Task, TextLabels};
use dendron_core::state::TreeState;
use dendron_core::task::{Conversation, ConversationMessage};

use crate::error::Result;
use crate::rows::{
    ExtendibleParentRow, IncompleteRankingRow, MissingTreeStateRow, OpenReplyTaskRow,
    TreeRankingResultRow, TreeSizeRow,
};
use crate::store::MessageStore;

#[derive(Default)]
struct Inner {
    messages: HashMap<Uuid, Message>,
    tree_states: HashMap<Uuid, MessageTreeState>,
    tasks: HashMap<Uuid, Task>,
    text_labels: Vec<TextLabels>,
    reactions: Vec<MessageReaction>,
    ratings: Vec<(Uuid, Uuid, i32)>,
    enabled_users: HashMap<Uuid, bool>,
}

/// An in-memory `MessageStore`, seeded and inspected directly by tests.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a message directly (bypasses `insert_message`'s no-op hooks).
    pub fn seed_message(&self, message: Message) {
        self.inner.write().unwrap().messages.insert(message.id, message);
    }

    /// Seed a tree state row directly.
    pub fn seed_tree_state(&self, state: MessageTreeState) {
        self.inner
            .write()
            .unwrap()
            .tree_states
            .insert(state.message_tree_id, state);
    }

    /// Mark a user enabled (defaults to enabled if never set).
    pub fn set_user_enabled(&self, user_id: Uuid, enabled: bool) {
        self.inner.write().unwrap().enabled_users.insert(user_id, enabled);
    }

    fn active_children_count(inner: &Inner, parent_id: Uuid) -> i64 {
        inner
            .messages
            .values()
            .filter(|m| m.parent_id == Some(parent_id) && !m.deleted)
            .count() as i64
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn prompts_need_review(
        &self,
        lang: &str,
        requesting_user_id: Uuid,
        allow_self_labeling: bool,
    ) -> Result<Vec<Message>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .messages
            .values()
            .filter(|m| m.is_root() && !m.deleted && !m.review_result && m.lang == lang)
            .filter(|m| {
                allow_self_labeling
                    || (m.user_id != requesting_user_id
                        && !inner
                            .text_labels
                            .iter()
                            .any(|l| l.message_id == m.id && l.user_id == requesting_user_id))
            })
            .cloned()
            .collect())
    }

    async fn replies_need_review(
        &self,
        lang: &str,
        role: Option<Role>,
        requesting_user_id: Uuid,
        allow_self_labeling: bool,
    ) -> Result<Vec<Message>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .messages
            .values()
            .filter(|m| !m.is_root() && !m.deleted && !m.review_result && m.lang == lang)
            .filter(|m| role.map_or(true, |r| m.role == r))
            .filter(|m| {
                allow_self_labeling
                    || (m.user_id != requesting_user_id
                        && !inner
                            .text_labels
                            .iter()
                            .any(|l| l.message_id == m.id && l.user_id == requesting_user_id))
            })
            .cloned()
            .collect())
    }

    async fn extendible_parents(
        &self,
        lang: &str,
        role: Option<Role>,
    ) -> Result<Vec<ExtendibleParentRow>> {
        let inner = self.inner.read().unwrap();
        let mut out = Vec::new();
        for m in inner.messages.values() {
            if m.deleted || !m.review_result || m.lang != lang {
                continue;
            }
            let Some(tree) = inner.tree_states.get(&m.message_tree_id) else {
                continue;
            };
            if !tree.active
                || !matches!(tree.state, TreeState::Growing | TreeState::InitialPromptReview)
            {
                continue;
            }
            if m.depth >= tree.max_depth {
                continue;
            }
            if let Some(role) = role {
                if m.role != role {
                    continue;
                }
            }
            let active_children_count = Self::active_children_count(&inner, m.id);
            if active_children_count >= tree.max_children_count as i64 {
                continue;
            }
            out.push(ExtendibleParentRow {
                message_id: m.id,
                message_tree_id: m.message_tree_id,
                role: m.role.as_str().to_string(),
                active_children_count,
                depth: m.depth,
            });
        }
        Ok(out)
    }

    async fn tree_size(&self, message_tree_id: Uuid) -> Result<TreeSizeRow> {
        let inner = self.inner.read().unwrap();
        let goal = inner
            .tree_states
            .get(&message_tree_id)
            .map(|t| t.goal_tree_size)
            .unwrap_or(0);
        let non_deleted: Vec<&Message> = inner
            .messages
            .values()
            .filter(|m| m.message_tree_id == message_tree_id && !m.deleted)
            .collect();
        let remaining_messages = (goal as i64 - non_deleted.len() as i64).max(0);
        let awaiting_review = non_deleted.iter().filter(|m| !m.review_result).count() as i64;
        Ok(TreeSizeRow {
            message_tree_id,
            remaining_messages,
            awaiting_review,
        })
    }

    async fn incomplete_rankings(
        &self,
        lang: &str,
        role: Option<Role>,
        num_required_rankings: i32,
    ) -> Result<Vec<IncompleteRankingRow>> {
        let inner = self.inner.read().unwrap();
        let mut out = Vec::new();
        for m in inner.messages.values() {
            if m.lang != lang {
                continue;
            }
            let Some(tree) = inner.tree_states.get(&m.message_tree_id) else {
                continue;
            };
            if !tree.active {
                continue;
            }
            if let Some(role) = role {
                // `role` filters the ranked children's role; the parent's
                // own role is the complement.
                if m.role != role.child_role() {
                    continue;
                }
            }
            let reviewed_children = inner
                .messages
                .values()
                .filter(|c| c.parent_id == Some(m.id) && !c.deleted && c.review_result)
                .count();
            if reviewed_children < 2 || m.ranking_count >= num_required_rankings {
                continue;
            }
            out.push(IncompleteRankingRow {
                message_id: m.id,
                message_tree_id: m.message_tree_id,
                role: m.role.as_str().to_string(),
                ranking_count: m.ranking_count,
            });
        }
        Ok(out)
    }

    async fn tree_ranking_results(&self, parent_message_id: Uuid) -> Result<TreeRankingResultRow> {
        let inner = self.inner.read().unwrap();
        let orderings = inner
            .reactions
            .iter()
            .filter(|r| r.message_id == parent_message_id)
            .map(|r| r.ranked_message_ids.clone())
            .collect();
        Ok(TreeRankingResultRow {
            parent_message_id,
            orderings,
        })
    }

    async fn num_active_trees(&self, lang: &str) -> Result<i64> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .tree_states
            .values()
            .filter(|t| {
                t.active && matches!(t.state, TreeState::Growing | TreeState::InitialPromptReview)
            })
            .filter(|t| {
                inner
                    .messages
                    .get(&t.message_tree_id)
                    .map(|root| root.lang == lang)
                    .unwrap_or(false)
            })
            .count() as i64)
    }

    async fn missing_tree_states(&self) -> Result<Vec<MissingTreeStateRow>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .messages
            .values()
            .filter(|m| m.is_root() && !inner.tree_states.contains_key(&m.id))
            .map(|m| MissingTreeStateRow {
                message_id: m.id,
                has_children: inner.messages.values().any(|c| c.parent_id == Some(m.id)),
            })
            .collect())
    }

    async fn open_reply_task_parents(&self, lang: &str) -> Result<Vec<OpenReplyTaskRow>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .tasks
            .values()
            .filter(|t| {
                !t.done
                    && matches!(t.payload_type.as_str(), "prompter_reply" | "assistant_reply")
            })
            .filter_map(|t| {
                let parent_message_id = t.parent_message_id?;
                let parent = inner.messages.get(&parent_message_id)?;
                (parent.lang == lang).then_some(OpenReplyTaskRow {
                    parent_message_id,
                    created_at: t.created_at,
                })
            })
            .collect())
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        Ok(self.inner.read().unwrap().messages.get(&id).cloned())
    }

    async fn get_message_tree_state(&self, message_tree_id: Uuid) -> Result<Option<MessageTreeState>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .tree_states
            .get(&message_tree_id)
            .cloned())
    }

    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<Message>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .messages
            .values()
            .filter(|m| m.parent_id == Some(parent_id) && !m.deleted)
            .cloned()
            .collect())
    }

    async fn conversation_path(&self, message_id: Uuid) -> Result<Conversation> {
        let inner = self.inner.read().unwrap();
        let mut messages = Vec::new();
        let mut current = inner.messages.get(&message_id);
        while let Some(m) = current {
            messages.push(ConversationMessage {
                id: m.id,
                text: m.text.clone(),
                role: m.role,
            });
            current = m.parent_id.and_then(|p| inner.messages.get(&p));
        }
        messages.reverse();
        Ok(Conversation { messages })
    }

    async fn labels_for_message(&self, message_id: Uuid) -> Result<Vec<TextLabels>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .text_labels
            .iter()
            .filter(|l| l.message_id == message_id)
            .cloned()
            .collect())
    }

    async fn backlog_trees(&self, lang: &str) -> Result<Vec<MessageTreeState>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .tree_states
            .values()
            .filter(|t| t.state == TreeState::BacklogRanking)
            .filter(|t| {
                inner
                    .messages
                    .get(&t.message_tree_id)
                    .map(|root| root.lang == lang)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn trees_in_state(&self, state: TreeState) -> Result<Vec<MessageTreeState>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .tree_states
            .values()
            .filter(|t| t.state == state)
            .cloned()
            .collect())
    }

    async fn insert_message(&self, message: Message) -> Result<Message> {
        self.inner.write().unwrap().messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn insert_default_tree_state(&self, message_tree_id: Uuid) -> Result<MessageTreeState> {
        let state = MessageTreeState {
            message_tree_id,
            state: TreeState::InitialPromptReview,
            active: true,
            goal_tree_size: 12,
            max_depth: 3,
            max_children_count: 3,
        };
        self.inner
            .write()
            .unwrap()
            .tree_states
            .insert(message_tree_id, state.clone());
        Ok(state)
    }

    async fn update_message_tree_state(&self, state: MessageTreeState) -> Result<()> {
        self.inner
            .write()
            .unwrap()
            .tree_states
            .insert(state.message_tree_id, state);
        Ok(())
    }

    async fn set_review_result(&self, message_id: Uuid, review_result: bool) -> Result<()> {
        if let Some(m) = self.inner.write().unwrap().messages.get_mut(&message_id) {
            m.review_result = review_result;
        }
        Ok(())
    }

    async fn increment_review_count(&self, message_id: Uuid) -> Result<i32> {
        let mut inner = self.inner.write().unwrap();
        let m = inner
            .messages
            .get_mut(&message_id)
            .ok_or_else(|| crate::error::ManagerError::NotFound(message_id.to_string()))?;
        m.review_count += 1;
        Ok(m.review_count)
    }

    async fn set_rank(&self, message_id: Uuid, rank: Option<i32>) -> Result<()> {
        if let Some(m) = self.inner.write().unwrap().messages.get_mut(&message_id) {
            m.rank = rank;
        }
        Ok(())
    }

    async fn insert_rating(&self, message_id: Uuid, user_id: Uuid, rating: i32) -> Result<()> {
        self.inner.write().unwrap().ratings.push((message_id, user_id, rating));
        Ok(())
    }

    async fn insert_ranking(&self, reaction: MessageReaction) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let message_id = reaction.message_id;
        inner.reactions.push(reaction);
        if let Some(m) = inner.messages.get_mut(&message_id) {
            m.ranking_count += 1;
        }
        Ok(())
    }

    async fn insert_text_labels(&self, labels: TextLabels) -> Result<()> {
        self.inner.write().unwrap().text_labels.push(labels);
        Ok(())
    }

    async fn insert_task(&self, task: Task) -> Result<Task> {
        self.inner.write().unwrap().tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn partition_user_messages(
        &self,
        user_id: Uuid,
        date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<(Vec<Uuid>, HashMap<Uuid, Vec<Uuid>>)> {
        let inner = self.inner.read().unwrap();
        let mut roots = Vec::new();
        let mut replies: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for m in inner.messages.values() {
            if m.user_id != user_id {
                continue;
            }
            if let Some((from, to)) = date_range {
                if m.created_date < from || m.created_date > to {
                    continue;
                }
            }
            if m.is_root() {
                roots.push(m.id);
            } else {
                replies.entry(m.message_tree_id).or_default().push(m.id);
            }
        }
        Ok((roots, replies))
    }

    async fn full_tree_including_deleted(&self, message_tree_id: Uuid) -> Result<Vec<Message>> {
        let mut out: Vec<Message> = self
            .inner
            .read()
            .unwrap()
            .messages
            .values()
            .filter(|m| m.message_tree_id == message_tree_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.depth.cmp(&a.depth));
        Ok(out)
    }

    async fn hard_delete_tree(&self, message_tree_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let ids: Vec<Uuid> = inner
            .messages
            .values()
            .filter(|m| m.message_tree_id == message_tree_id)
            .map(|m| m.id)
            .collect();
        inner.messages.retain(|id, _| !ids.contains(id));
        inner.text_labels.retain(|l| !ids.contains(&l.message_id));
        inner.reactions.retain(|r| !ids.contains(&r.message_id));
        inner
            .tasks
            .retain(|_, t| t.message_tree_id != Some(message_tree_id));
        inner.tree_states.remove(&message_tree_id);
        Ok(())
    }

    async fn hard_delete_message(&self, message_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.messages.remove(&message_id);
        inner.text_labels.retain(|l| l.message_id != message_id);
        inner.reactions.retain(|r| r.message_id != message_id);
        inner
            .tasks
            .retain(|_, t| t.parent_message_id != Some(message_id));
        Ok(())
    }

    async fn recompute_children_counts(&self, _parent_ids: &[Uuid]) -> Result<()> {
        // `active_children_count` is derived live from `messages`, same as `PgStore`.
        Ok(())
    }

    async fn ban_user(&self, user_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.reactions.retain(|r| r.user_id != user_id);
        inner.text_labels.retain(|l| l.user_id != user_id);
        inner.tasks.retain(|_, t| t.user_id != user_id);
        inner.enabled_users.insert(user_id, false);
        Ok(())
    }

    async fn is_user_enabled(&self, user_id: Uuid) -> Result<bool> {
        Ok(*self
            .inner
            .read()
            .unwrap()
            .enabled_users
            .get(&user_id)
            .unwrap_or(&true))
    }

    async fn scoring_failed_trees(&self) -> Result<Vec<MessageTreeState>> {
        self.trees_in_state(TreeState::ScoringFailed).await
    }

    async fn ready_for_export_trees(&self) -> Result<Vec<Uuid>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .tree_states
            .values()
            .filter(|t| t.state == TreeState::ReadyForExport)
            .map(|t| t.message_tree_id)
            .collect())
    }

    async fn trees_authored_by(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .messages
            .values()
            .filter(|m| m.is_root() && m.user_id == user_id)
            .map(|m| m.id)
            .collect())
    }

    async fn tree_counts_by_state(&self) -> Result<HashMap<String, i64>> {
        let inner = self.inner.read().unwrap();
        let mut counts: HashMap<String, i64> = HashMap::new();
        for t in inner.tree_states.values() {
            *counts.entry(t.state.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn tree_message_count_stats(&self) -> Result<(f64, i64, i64)> {
        let inner = self.inner.read().unwrap();
        let mut per_tree: HashMap<Uuid, i64> = HashMap::new();
        for m in inner.messages.values().filter(|m| !m.deleted) {
            *per_tree.entry(m.message_tree_id).or_insert(0) += 1;
        }
        if per_tree.is_empty() {
            return Ok((0.0, 0, 0));
        }
        let counts: Vec<i64> = per_tree.values().copied().collect();
        let avg = counts.iter().sum::<i64>() as f64 / counts.len() as f64;
        let min = *counts.iter().min().unwrap();
        let max = *counts.iter().max().unwrap();
        Ok((avg, min, max))
    }
}
