//! The persistence trait the rest of `dendron-manager` is built against.
//! One method per query/mutation named across the design's query layer and
//! component sections; a `PgStore` (sqlx/Postgres) and an `InMemoryStore`
//! (test double) both implement it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use dendron_core::model::{Message, MessageReaction, MessageTreeState, Role, Task, TextLabels};
use dendron_core::state::TreeState;
use dendron_core::task::Conversation;

use crate::error::Result;
use crate::rows::{
    ExtendibleParentRow, IncompleteRankingRow, MissingTreeStateRow, OpenReplyTaskRow,
    TreeRankingResultRow, TreeSizeRow,
};

/// Everything the dispatcher, interaction handler, and maintenance routines
/// need from the relational store. All filter semantics (active tree,
/// state, non-deleted, role, language, self-exclusion, duplicate-task
/// suppression) are the caller's contract with the implementation, not
/// encoded in the trait's types.
#[async_trait]
pub trait MessageStore: Send + Sync {
    // -- query layer -----------------------------------------------------

    /// Root messages whose review count is below the prompt threshold, in
    /// `lang`, excluding ones the requesting user already reviewed (unless
    /// `allow_self_labeling`).
    async fn prompts_need_review(
        &self,
        lang: &str,
        requesting_user_id: Uuid,
        allow_self_labeling: bool,
    ) -> Result<Vec<Message>>;

    /// Non-root messages needing review, optionally filtered to one role.
    async fn replies_need_review(
        &self,
        lang: &str,
        role: Option<Role>,
        requesting_user_id: Uuid,
        allow_self_labeling: bool,
    ) -> Result<Vec<Message>>;

    /// Non-deleted, reviewed messages eligible for another child, optionally
    /// filtered by the parent's role.
    async fn extendible_parents(
        &self,
        lang: &str,
        role: Option<Role>,
    ) -> Result<Vec<ExtendibleParentRow>>;

    /// Aggregate size figures for a tree's `GROWING -> RANKING` guard.
    async fn tree_size(&self, message_tree_id: Uuid) -> Result<TreeSizeRow>;

    /// Parents with >=2 reviewed children whose ranking count is below
    /// quorum. `role`, when given, filters on the role of the *children*
    /// being ranked (mirroring `replies_need_review`'s role filter on the
    /// reply's own role) — a parent is only returned if its children have
    /// that role, i.e. the parent's own role is the complement.
    async fn incomplete_rankings(
        &self,
        lang: &str,
        role: Option<Role>,
        num_required_rankings: i32,
    ) -> Result<Vec<IncompleteRankingRow>>;

    /// Every ranking submission recorded against `parent_message_id`.
    async fn tree_ranking_results(&self, parent_message_id: Uuid) -> Result<TreeRankingResultRow>;

    /// Count of `GROWING`/`INITIAL_PROMPT_REVIEW` trees in `lang`.
    async fn num_active_trees(&self, lang: &str) -> Result<i64>;

    /// Roots lacking a `MessageTreeState` row.
    async fn missing_tree_states(&self) -> Result<Vec<MissingTreeStateRow>>;

    /// Open (`done = false`) reply tasks on parents in `lang`, used for the
    /// recency exclusion window.
    async fn open_reply_task_parents(&self, lang: &str) -> Result<Vec<OpenReplyTaskRow>>;

    // -- entity access -----------------------------------------------------

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>>;
    async fn get_message_tree_state(&self, message_tree_id: Uuid) -> Result<Option<MessageTreeState>>;
    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<Message>>;
    async fn conversation_path(&self, message_id: Uuid) -> Result<Conversation>;
    async fn labels_for_message(&self, message_id: Uuid) -> Result<Vec<TextLabels>>;

    /// Message trees in `BACKLOG_RANKING` matching `lang`.
    async fn backlog_trees(&self, lang: &str) -> Result<Vec<MessageTreeState>>;

    /// Every tree currently in `state`, any language. Used by the bulk
    /// maintenance pass that re-runs the advancing condition checks.
    async fn trees_in_state(&self, state: TreeState) -> Result<Vec<MessageTreeState>>;

    // -- writes ------------------------------------------------------------

    async fn insert_message(&self, message: Message) -> Result<Message>;
    async fn insert_default_tree_state(&self, message_tree_id: Uuid) -> Result<MessageTreeState>;
    async fn update_message_tree_state(&self, state: MessageTreeState) -> Result<()>;
    async fn set_review_result(&self, message_id: Uuid, review_result: bool) -> Result<()>;
    async fn increment_review_count(&self, message_id: Uuid) -> Result<i32>;
    async fn set_rank(&self, message_id: Uuid, rank: Option<i32>) -> Result<()>;
    async fn insert_rating(&self, message_id: Uuid, user_id: Uuid, rating: i32) -> Result<()>;
    async fn insert_ranking(&self, reaction: MessageReaction) -> Result<()>;
    async fn insert_text_labels(&self, labels: TextLabels) -> Result<()>;
    async fn insert_task(&self, task: Task) -> Result<Task>;

    // -- purge/maintenance ---------------------------------------------------

    /// Messages a user authored, split into roots they created and a map
    /// of tree id to their reply ids in that tree.
    async fn partition_user_messages(
        &self,
        user_id: Uuid,
        date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<(Vec<Uuid>, std::collections::HashMap<Uuid, Vec<Uuid>>)>;

    /// All messages of a tree, including soft-deleted ones, for the purge
    /// ancestor walk.
    async fn full_tree_including_deleted(&self, message_tree_id: Uuid) -> Result<Vec<Message>>;

    /// Hard-delete a full tree and every cascading row.
    async fn hard_delete_tree(&self, message_tree_id: Uuid) -> Result<()>;

    /// Hard-delete a single message and its cascading rows (labels, ranking
    /// reactions, tasks).
    async fn hard_delete_message(&self, message_id: Uuid) -> Result<()>;

    /// Recompute `active_children_count` for the given parents after a purge.
    async fn recompute_children_counts(&self, parent_ids: &[Uuid]) -> Result<()>;

    /// Wipe a user's reactions/emoji/tasks/journal rows and disable them.
    async fn ban_user(&self, user_id: Uuid) -> Result<()>;

    async fn is_user_enabled(&self, user_id: Uuid) -> Result<bool>;

    /// All trees currently in `SCORING_FAILED`.
    async fn scoring_failed_trees(&self) -> Result<Vec<MessageTreeState>>;

    /// All trees in `READY_FOR_EXPORT`.
    async fn ready_for_export_trees(&self) -> Result<Vec<Uuid>>;

    /// Tree ids authored (as root) by `user_id`.
    async fn trees_authored_by(&self, user_id: Uuid) -> Result<Vec<Uuid>>;

    /// Count of trees per state, for reporting.
    async fn tree_counts_by_state(&self) -> Result<std::collections::HashMap<String, i64>>;

    /// Message-count percentiles/aggregates per tree, for reporting.
    async fn tree_message_count_stats(&self) -> Result<(f64, i64, i64)>;
}
