//! Domain entities: messages, tree state rows, tasks, labels, reactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::TreeState;

/// The two alternating participant roles in a conversation tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Prompter,
    Assistant,
}

impl Role {
    /// The role of a direct child of a message with this role.
    pub fn child_role(self) -> Role {
        match self {
            Role::Prompter => Role::Assistant,
            Role::Assistant => Role::Prompter,
        }
    }

    /// Parse from the lowercase wire representation used by the store.
    pub fn from_str_opt(s: &str) -> Option<Role> {
        match s {
            "prompter" => Some(Role::Prompter),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }

    /// The lowercase wire representation used by the store.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Prompter => "prompter",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A node in a conversation tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub message_tree_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub depth: i32,
    pub role: Role,
    pub text: String,
    pub lang: String,
    pub review_count: i32,
    pub review_result: bool,
    pub deleted: bool,
    pub ranking_count: i32,
    pub rank: Option<i32>,
    pub user_id: Uuid,
    pub task_id: Option<Uuid>,
    pub created_date: DateTime<Utc>,
}

impl Message {
    /// A root message is its own tree id and has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// One row per root message, tracking the life-cycle of its tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTreeState {
    pub message_tree_id: Uuid,
    pub state: TreeState,
    pub active: bool,
    pub goal_tree_size: i32,
    pub max_depth: i32,
    pub max_children_count: i32,
}

/// A dispatched work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub parent_message_id: Option<Uuid>,
    pub message_tree_id: Option<Uuid>,
    pub payload_type: String,
    pub done: bool,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A worker's label submission on a specific message.
///
/// `labels` maps a label name (see [`crate::labels::TextLabel`]) to a value
/// in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLabels {
    pub id: Uuid,
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub task_id: Option<Uuid>,
    pub labels: std::collections::HashMap<String, f64>,
}

/// A worker's reaction to a message (currently only ranking submissions are
/// modeled; ratings are persisted by the store without a typed payload here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReaction {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub message_id: Uuid,
    pub ranked_message_ids: Vec<Uuid>,
}
