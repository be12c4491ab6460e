//! Postgres-backed `MessageStore`, built on composable `sqlx::QueryBuilder`
//! calls rather than ad-hoc format!-built SQL strings, so the filter
//! composition (active tree / state / non-deleted / role / language /
//! self-exclusion / duplicate-task suppression) stays legible and reusable.
//!
//! Domain entities carry enum-typed fields (`Role`, `TreeState`) that are
//! stored as plain text columns, so rows are fetched as typed tuples and
//! mapped by hand rather than via a blanket `#[derive(FromRow)]` on the
//! entity itself; only the narrow DTOs in `rows` (whose fields are already
//! primitives) derive `FromRow` directly.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use dendron_core::model::{Message, MessageReaction, MessageTreeState, Role, Task, TextLabels};
use dendron_core::state::TreeState;
use dendron_core::task::{Conversation, ConversationMessage};

use crate::error::{ManagerError, Result};
use crate::rows::{
    ExtendibleParentRow, IncompleteRankingRow, MissingTreeStateRow, OpenReplyTaskRow,
    TreeRankingResultRow, TreeSizeRow,
};
use crate::store::MessageStore;

type MessageRow = (
    Uuid,
    Uuid,
    Option<Uuid>,
    i32,
    String,
    String,
    String,
    i32,
    bool,
    bool,
    i32,
    Option<i32>,
    Uuid,
    Option<Uuid>,
    DateTime<Utc>,
);

fn message_from_row(row: MessageRow) -> Result<Message> {
    let (
        id,
        message_tree_id,
        parent_id,
        depth,
        role,
        text,
        lang,
        review_count,
        review_result,
        deleted,
        ranking_count,
        rank,
        user_id,
        task_id,
        created_date,
    ) = row;
    let role = Role::from_str_opt(&role)
        .ok_or_else(|| ManagerError::Core(format!("unknown role '{role}' on message {id}")))?;
    Ok(Message {
        id,
        message_tree_id,
        parent_id,
        depth,
        role,
        text,
        lang,
        review_count,
        review_result,
        deleted,
        ranking_count,
        rank,
        user_id,
        task_id,
        created_date,
    })
}

const MESSAGE_COLUMNS: &str = "id, message_tree_id, parent_id, depth, role, text, lang, \
     review_count, review_result, deleted, ranking_count, rank, user_id, task_id, created_date";

type TreeStateRow = (Uuid, String, bool, i32, i32, i32);

fn tree_state_from_row(row: TreeStateRow) -> Result<MessageTreeState> {
    let (message_tree_id, state, active, goal_tree_size, max_depth, max_children_count) = row;
    let state = TreeState::from_str(&state)
        .map_err(|_| ManagerError::Core(format!("unknown tree state '{state}'")))?;
    Ok(MessageTreeState {
        message_tree_id,
        state,
        active,
        goal_tree_size,
        max_depth,
        max_children_count,
    })
}

const TREE_STATE_COLUMNS: &str =
    "message_tree_id, state, active, goal_tree_size, max_depth, max_children_count";

type TaskRow = (Uuid, Option<Uuid>, Option<Uuid>, String, bool, Uuid, DateTime<Utc>);

fn task_from_row(row: TaskRow) -> Task {
    let (id, parent_message_id, message_tree_id, payload_type, done, user_id, created_at) = row;
    Task {
        id,
        parent_message_id,
        message_tree_id,
        payload_type,
        done,
        user_id,
        created_at,
    }
}

const TASK_COLUMNS: &str =
    "id, parent_message_id, message_tree_id, payload_type, done, user_id, created_at";

/// A `MessageStore` backed by a `sqlx::PgPool`.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn prompts_need_review(
        &self,
        lang: &str,
        requesting_user_id: Uuid,
        allow_self_labeling: bool,
    ) -> Result<Vec<Message>> {
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new("SELECT ");
        qb.push(MESSAGE_COLUMNS);
        qb.push(" FROM message WHERE parent_id IS NULL AND deleted = false AND review_result = false AND lang = ");
        qb.push_bind(lang.to_string());
        if !allow_self_labeling {
            qb.push(" AND user_id <> ");
            qb.push_bind(requesting_user_id);
            qb.push(" AND id NOT IN (SELECT message_id FROM text_labels WHERE user_id = ");
            qb.push_bind(requesting_user_id);
            qb.push(")");
        }
        let rows: Vec<MessageRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(message_from_row).collect()
    }

    async fn replies_need_review(
        &self,
        lang: &str,
        role: Option<Role>,
        requesting_user_id: Uuid,
        allow_self_labeling: bool,
    ) -> Result<Vec<Message>> {
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new("SELECT ");
        qb.push(MESSAGE_COLUMNS);
        qb.push(" FROM message WHERE parent_id IS NOT NULL AND deleted = false AND review_result = false AND lang = ");
        qb.push_bind(lang.to_string());
        if let Some(role) = role {
            qb.push(" AND role = ");
            qb.push_bind(role.as_str());
        }
        if !allow_self_labeling {
            qb.push(" AND user_id <> ");
            qb.push_bind(requesting_user_id);
            qb.push(" AND id NOT IN (SELECT message_id FROM text_labels WHERE user_id = ");
            qb.push_bind(requesting_user_id);
            qb.push(")");
        }
        let rows: Vec<MessageRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(message_from_row).collect()
    }

    async fn extendible_parents(
        &self,
        lang: &str,
        role: Option<Role>,
    ) -> Result<Vec<ExtendibleParentRow>> {
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT m.id AS message_id, m.message_tree_id, m.role, m.depth, \
             COUNT(c.id) FILTER (WHERE c.deleted = false) AS active_children_count \
             FROM message m \
             JOIN message_tree_state mts ON mts.message_tree_id = m.message_tree_id \
             LEFT JOIN message c ON c.parent_id = m.id \
             WHERE m.deleted = false AND m.review_result = true AND m.lang = ",
        );
        qb.push_bind(lang.to_string());
        qb.push(" AND mts.active = true AND mts.state IN ('growing', 'initial_prompt_review')");
        qb.push(" AND m.depth < mts.max_depth");
        if let Some(role) = role {
            qb.push(" AND m.role = ");
            qb.push_bind(role.as_str());
        }
        qb.push(" GROUP BY m.id, m.message_tree_id, m.role, m.depth, mts.max_children_count");
        qb.push(" HAVING COUNT(c.id) FILTER (WHERE c.deleted = false) < mts.max_children_count");
        let rows = qb
            .build_query_as::<ExtendibleParentRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn tree_size(&self, message_tree_id: Uuid) -> Result<TreeSizeRow> {
        let row = sqlx::query_as::<_, TreeSizeRow>(
            "SELECT mts.message_tree_id, \
             GREATEST(mts.goal_tree_size - COUNT(m.id) FILTER (WHERE m.deleted = false), 0) AS remaining_messages, \
             COUNT(m.id) FILTER (WHERE m.deleted = false AND m.review_result = false) AS awaiting_review \
             FROM message_tree_state mts \
             LEFT JOIN message m ON m.message_tree_id = mts.message_tree_id \
             WHERE mts.message_tree_id = $1 \
             GROUP BY mts.message_tree_id, mts.goal_tree_size",
        )
        .bind(message_tree_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn incomplete_rankings(
        &self,
        lang: &str,
        role: Option<Role>,
        num_required_rankings: i32,
    ) -> Result<Vec<IncompleteRankingRow>> {
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT m.id AS message_id, m.message_tree_id, m.role, m.ranking_count \
             FROM message m \
             JOIN message_tree_state mts ON mts.message_tree_id = m.message_tree_id \
             LEFT JOIN message c ON c.parent_id = m.id \
             WHERE mts.active = true AND m.lang = ",
        );
        qb.push_bind(lang.to_string());
        if let Some(role) = role {
            // `role` filters the ranked children's role; the parent's own
            // role is the complement (see `MessageStore::incomplete_rankings`).
            qb.push(" AND m.role = ");
            qb.push_bind(role.child_role().as_str());
        }
        qb.push(" GROUP BY m.id, m.message_tree_id, m.role, m.ranking_count");
        qb.push(" HAVING COUNT(c.id) FILTER (WHERE c.deleted = false AND c.review_result = true) >= 2");
        qb.push(" AND m.ranking_count < ");
        qb.push_bind(num_required_rankings);
        let rows = qb
            .build_query_as::<IncompleteRankingRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn tree_ranking_results(&self, parent_message_id: Uuid) -> Result<TreeRankingResultRow> {
        let rows: Vec<(Vec<Uuid>,)> = sqlx::query_as(
            "SELECT ranked_message_ids FROM message_reaction WHERE message_id = $1",
        )
        .bind(parent_message_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(TreeRankingResultRow {
            parent_message_id,
            orderings: rows.into_iter().map(|(o,)| o).collect(),
        })
    }

    async fn num_active_trees(&self, lang: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM message_tree_state mts \
             JOIN message m ON m.id = mts.message_tree_id \
             WHERE mts.active = true AND mts.state IN ('growing', 'initial_prompt_review') AND m.lang = $1",
        )
        .bind(lang)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn missing_tree_states(&self) -> Result<Vec<MissingTreeStateRow>> {
        let rows = sqlx::query_as::<_, MissingTreeStateRow>(
            "SELECT m.id AS message_id, EXISTS( \
                SELECT 1 FROM message c WHERE c.parent_id = m.id \
             ) AS has_children \
             FROM message m \
             LEFT JOIN message_tree_state mts ON mts.message_tree_id = m.id \
             WHERE m.parent_id IS NULL AND mts.message_tree_id IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn open_reply_task_parents(&self, lang: &str) -> Result<Vec<OpenReplyTaskRow>> {
        let rows = sqlx::query_as::<_, OpenReplyTaskRow>(
            "SELECT t.parent_message_id, t.created_at FROM task t \
             JOIN message m ON m.id = t.parent_message_id \
             WHERE t.done = false AND m.lang = $1 AND t.payload_type IN ('prompter_reply', 'assistant_reply')",
        )
        .bind(lang)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM message WHERE id = $1");
        let row: Option<MessageRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(message_from_row).transpose()
    }

    async fn get_message_tree_state(&self, message_tree_id: Uuid) -> Result<Option<MessageTreeState>> {
        let sql = format!(
            "SELECT {TREE_STATE_COLUMNS} FROM message_tree_state WHERE message_tree_id = $1"
        );
        let row: Option<TreeStateRow> = sqlx::query_as(&sql)
            .bind(message_tree_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(tree_state_from_row).transpose()
    }

    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<Message>> {
        let sql =
            format!("SELECT {MESSAGE_COLUMNS} FROM message WHERE parent_id = $1 AND deleted = false");
        let rows: Vec<MessageRow> = sqlx::query_as(&sql)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(message_from_row).collect()
    }

    async fn conversation_path(&self, message_id: Uuid) -> Result<Conversation> {
        let rows = sqlx::query_as::<_, (Uuid, String, String)>(
            "WITH RECURSIVE path AS ( \
                SELECT id, text, role, parent_id FROM message WHERE id = $1 \
                UNION ALL \
                SELECT m.id, m.text, m.role, m.parent_id FROM message m \
                JOIN path p ON m.id = p.parent_id \
             ) \
             SELECT id, text, role FROM path",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<ConversationMessage> = rows
            .into_iter()
            .filter_map(|(id, text, role)| {
                Role::from_str_opt(&role).map(|role| ConversationMessage { id, text, role })
            })
            .collect();
        messages.reverse();
        Ok(Conversation { messages })
    }

    async fn labels_for_message(&self, message_id: Uuid) -> Result<Vec<TextLabels>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, Uuid, Option<Uuid>, sqlx::types::Json<HashMap<String, f64>>)>(
            "SELECT id, message_id, user_id, task_id, labels FROM text_labels WHERE message_id = $1",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, message_id, user_id, task_id, labels)| TextLabels {
                id,
                message_id,
                user_id,
                task_id,
                labels: labels.0,
            })
            .collect())
    }

    async fn backlog_trees(&self, lang: &str) -> Result<Vec<MessageTreeState>> {
        let sql = format!(
            "SELECT mts.message_tree_id, mts.state, mts.active, mts.goal_tree_size, \
             mts.max_depth, mts.max_children_count \
             FROM message_tree_state mts \
             JOIN message m ON m.id = mts.message_tree_id \
             WHERE mts.state = 'backlog_ranking' AND m.lang = $1"
        );
        let rows: Vec<TreeStateRow> = sqlx::query_as(&sql).bind(lang).fetch_all(&self.pool).await?;
        rows.into_iter().map(tree_state_from_row).collect()
    }

    async fn trees_in_state(&self, state: TreeState) -> Result<Vec<MessageTreeState>> {
        let sql = format!("SELECT {TREE_STATE_COLUMNS} FROM message_tree_state WHERE state = $1");
        let rows: Vec<TreeStateRow> = sqlx::query_as(&sql)
            .bind(state.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(tree_state_from_row).collect()
    }

    async fn insert_message(&self, message: Message) -> Result<Message> {
        let sql = format!(
            "INSERT INTO message ({MESSAGE_COLUMNS}) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15) \
             RETURNING {MESSAGE_COLUMNS}"
        );
        let row: MessageRow = sqlx::query_as(&sql)
            .bind(message.id)
            .bind(message.message_tree_id)
            .bind(message.parent_id)
            .bind(message.depth)
            .bind(message.role.as_str())
            .bind(&message.text)
            .bind(&message.lang)
            .bind(message.review_count)
            .bind(message.review_result)
            .bind(message.deleted)
            .bind(message.ranking_count)
            .bind(message.rank)
            .bind(message.user_id)
            .bind(message.task_id)
            .bind(message.created_date)
            .fetch_one(&self.pool)
            .await?;
        message_from_row(row)
    }

    async fn insert_default_tree_state(&self, message_tree_id: Uuid) -> Result<MessageTreeState> {
        let sql = format!(
            "INSERT INTO message_tree_state (message_tree_id, state, active, goal_tree_size, max_depth, max_children_count) \
             VALUES ($1, $2, true, $3, $4, $5) RETURNING {TREE_STATE_COLUMNS}"
        );
        let row: TreeStateRow = sqlx::query_as(&sql)
            .bind(message_tree_id)
            .bind(TreeState::InitialPromptReview.to_string())
            .bind(12i32)
            .bind(3i32)
            .bind(3i32)
            .fetch_one(&self.pool)
            .await?;
        tree_state_from_row(row)
    }

    async fn update_message_tree_state(&self, state: MessageTreeState) -> Result<()> {
        sqlx::query(
            "UPDATE message_tree_state SET state = $2, active = $3, goal_tree_size = $4, \
             max_depth = $5, max_children_count = $6 WHERE message_tree_id = $1",
        )
        .bind(state.message_tree_id)
        .bind(state.state.to_string())
        .bind(state.active)
        .bind(state.goal_tree_size)
        .bind(state.max_depth)
        .bind(state.max_children_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_review_result(&self, message_id: Uuid, review_result: bool) -> Result<()> {
        sqlx::query("UPDATE message SET review_result = $2 WHERE id = $1")
            .bind(message_id)
            .bind(review_result)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_review_count(&self, message_id: Uuid) -> Result<i32> {
        let (count,): (i32,) = sqlx::query_as(
            "UPDATE message SET review_count = review_count + 1 WHERE id = $1 RETURNING review_count",
        )
        .bind(message_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn set_rank(&self, message_id: Uuid, rank: Option<i32>) -> Result<()> {
        sqlx::query("UPDATE message SET rank = $2 WHERE id = $1")
            .bind(message_id)
            .bind(rank)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_rating(&self, message_id: Uuid, user_id: Uuid, rating: i32) -> Result<()> {
        sqlx::query(
            "INSERT INTO message_rating (id, message_id, user_id, rating) VALUES ($1,$2,$3,$4)",
        )
        .bind(Uuid::new_v4())
        .bind(message_id)
        .bind(user_id)
        .bind(rating)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_ranking(&self, reaction: MessageReaction) -> Result<()> {
        sqlx::query(
            "INSERT INTO message_reaction (id, task_id, user_id, message_id, ranked_message_ids) \
             VALUES ($1,$2,$3,$4,$5)",
        )
        .bind(reaction.id)
        .bind(reaction.task_id)
        .bind(reaction.user_id)
        .bind(reaction.message_id)
        .bind(&reaction.ranked_message_ids)
        .execute(&self.pool)
        .await?;
        sqlx::query("UPDATE message SET ranking_count = ranking_count + 1 WHERE id = $1")
            .bind(reaction.message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_text_labels(&self, labels: TextLabels) -> Result<()> {
        sqlx::query(
            "INSERT INTO text_labels (id, message_id, user_id, task_id, labels) VALUES ($1,$2,$3,$4,$5)",
        )
        .bind(labels.id)
        .bind(labels.message_id)
        .bind(labels.user_id)
        .bind(labels.task_id)
        .bind(sqlx::types::Json(labels.labels))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_task(&self, task: Task) -> Result<Task> {
        let sql = format!(
            "INSERT INTO task ({TASK_COLUMNS}) VALUES ($1,$2,$3,$4,$5,$6,$7) RETURNING {TASK_COLUMNS}"
        );
        let row: TaskRow = sqlx::query_as(&sql)
            .bind(task.id)
            .bind(task.parent_message_id)
            .bind(task.message_tree_id)
            .bind(&task.payload_type)
            .bind(task.done)
            .bind(task.user_id)
            .bind(task.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(task_from_row(row))
    }

    async fn partition_user_messages(
        &self,
        user_id: Uuid,
        date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<(Vec<Uuid>, HashMap<Uuid, Vec<Uuid>>)> {
        let mut qb: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT id, message_tree_id, parent_id FROM message WHERE user_id = ");
        qb.push_bind(user_id);
        if let Some((from, to)) = date_range {
            qb.push(" AND created_date BETWEEN ");
            qb.push_bind(from);
            qb.push(" AND ");
            qb.push_bind(to);
        }
        let rows: Vec<(Uuid, Uuid, Option<Uuid>)> =
            qb.build_query_as().fetch_all(&self.pool).await?;

        let mut roots = Vec::new();
        let mut replies: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for (id, tree_id, parent_id) in rows {
            if parent_id.is_none() {
                roots.push(id);
            } else {
                replies.entry(tree_id).or_default().push(id);
            }
        }
        Ok((roots, replies))
    }

    async fn full_tree_including_deleted(&self, message_tree_id: Uuid) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM message WHERE message_tree_id = $1 ORDER BY depth DESC"
        );
        let rows: Vec<MessageRow> = sqlx::query_as(&sql)
            .bind(message_tree_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(message_from_row).collect()
    }

    async fn hard_delete_tree(&self, message_tree_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM text_labels WHERE message_id IN (SELECT id FROM message WHERE message_tree_id = $1)")
            .bind(message_tree_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM message_reaction WHERE message_id IN (SELECT id FROM message WHERE message_tree_id = $1)")
            .bind(message_tree_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM task WHERE message_tree_id = $1")
            .bind(message_tree_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM message WHERE message_tree_id = $1")
            .bind(message_tree_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM message_tree_state WHERE message_tree_id = $1")
            .bind(message_tree_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn hard_delete_message(&self, message_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM text_labels WHERE message_id = $1")
            .bind(message_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM message_reaction WHERE message_id = $1")
            .bind(message_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM task WHERE parent_message_id = $1")
            .bind(message_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM message WHERE id = $1")
            .bind(message_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn recompute_children_counts(&self, _parent_ids: &[Uuid]) -> Result<()> {
        // active_children_count is derived live in `extendible_parents`, not
        // stored, so there is nothing to recompute against Postgres.
        Ok(())
    }

    async fn ban_user(&self, user_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM message_reaction WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM text_labels WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM task WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE \"user\" SET enabled = false WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn is_user_enabled(&self, user_id: Uuid) -> Result<bool> {
        let row: Option<(bool,)> = sqlx::query_as("SELECT enabled FROM \"user\" WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(enabled,)| enabled).unwrap_or(false))
    }

    async fn scoring_failed_trees(&self) -> Result<Vec<MessageTreeState>> {
        let sql = format!(
            "SELECT {TREE_STATE_COLUMNS} FROM message_tree_state WHERE state = 'scoring_failed'"
        );
        let rows: Vec<TreeStateRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(tree_state_from_row).collect()
    }

    async fn ready_for_export_trees(&self) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT message_tree_id FROM message_tree_state WHERE state = 'ready_for_export'",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn trees_authored_by(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM message WHERE user_id = $1 AND parent_id IS NULL",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn tree_counts_by_state(&self) -> Result<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM message_tree_state GROUP BY state")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn tree_message_count_stats(&self) -> Result<(f64, i64, i64)> {
        let row: (Option<f64>, Option<i64>, Option<i64>) = sqlx::query_as(
            "SELECT AVG(cnt), MIN(cnt), MAX(cnt) FROM ( \
                SELECT COUNT(*) AS cnt FROM message WHERE deleted = false GROUP BY message_tree_id \
             ) sub",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok((row.0.unwrap_or(0.0), row.1.unwrap_or(0), row.2.unwrap_or(0)))
    }
}
