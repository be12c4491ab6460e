//! Row-shaped DTOs returned directly by query-layer methods, distinct from
//! the richer domain types in `dendron_core::model` (mirrors the donor
//! pack's `queries::row_types` pattern of narrow `FromRow` structs per
//! query rather than reusing the full entity type everywhere).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use dendron_core::model::Role;

/// A parent message eligible for another child (§ Extendible parent).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExtendibleParentRow {
    pub message_id: Uuid,
    pub message_tree_id: Uuid,
    pub role: String,
    pub active_children_count: i64,
    pub depth: i32,
}

impl ExtendibleParentRow {
    pub fn parent_role(&self) -> Option<Role> {
        Role::from_str_opt(&self.role)
    }
}

/// A parent with an incomplete ranking-submission count.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IncompleteRankingRow {
    pub message_id: Uuid,
    pub message_tree_id: Uuid,
    pub role: String,
    pub ranking_count: i32,
}

/// Aggregate tree-size figures used by the `GROWING -> RANKING` guard.
#[derive(Debug, Clone, Copy, FromRow, Serialize, Deserialize)]
pub struct TreeSizeRow {
    pub message_tree_id: Uuid,
    pub remaining_messages: i64,
    pub awaiting_review: i64,
}

/// One parent's ranking submissions, ready to feed the consensus engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeRankingResultRow {
    pub parent_message_id: Uuid,
    pub orderings: Vec<Vec<Uuid>>,
}

/// Count of open (`done = false`) reply tasks on a parent, with its age.
#[derive(Debug, Clone, Copy, FromRow, Serialize, Deserialize)]
pub struct OpenReplyTaskRow {
    pub parent_message_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A root lacking a `MessageTreeState` row.
#[derive(Debug, Clone, Copy, FromRow, Serialize, Deserialize)]
pub struct MissingTreeStateRow {
    pub message_id: Uuid,
    pub has_children: bool,
}
