//! Builds the exportable dataset bundle (§6 "Export"): one record per tree,
//! each carrying its full (optionally reviewed-only) message set, ready for
//! JSON serialization and optional gzip compression. Three entry points
//! mirror the donor script's `export_trees_to_file` / `export_all_ready_trees`
//! / `export_all_user_trees` trio.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dendron_core::model::{Message, Role};

use crate::error::Result;
use crate::store::MessageStore;

/// A single exported message, flattened from the domain [`Message`] to the
/// fields a dataset consumer needs (provenance columns like `task_id` are
/// dropped; moderation counters are kept for downstream filtering).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMessage {
    pub message_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub text: String,
    pub role: Role,
    pub lang: String,
    pub review_count: i32,
    pub review_result: bool,
    pub rank: Option<i32>,
    pub deleted: bool,
}

impl From<&Message> for ExportMessage {
    fn from(m: &Message) -> Self {
        ExportMessage {
            message_id: m.id,
            parent_id: m.parent_id,
            text: m.text.clone(),
            role: m.role,
            lang: m.lang.clone(),
            review_count: m.review_count,
            review_result: m.review_result,
            rank: m.rank,
            deleted: m.deleted,
        }
    }
}

/// One exported tree: its root id and the flattened message set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportTree {
    pub message_tree_id: Uuid,
    pub messages: Vec<ExportMessage>,
}

/// Build the bundle for an explicit list of tree ids. `reviewed_only` drops
/// messages that never cleared `review_result`; `include_deleted` controls
/// whether soft-deleted messages are kept in (for audit exports) or dropped.
pub async fn export_trees<S: MessageStore>(
    store: &S,
    message_tree_ids: &[Uuid],
    reviewed_only: bool,
    include_deleted: bool,
) -> Result<Vec<ExportTree>> {
    let mut trees = Vec::with_capacity(message_tree_ids.len());
    for &message_tree_id in message_tree_ids {
        let messages = store.full_tree_including_deleted(message_tree_id).await?;
        let messages: Vec<ExportMessage> = messages
            .iter()
            .filter(|m| include_deleted || !m.deleted)
            .filter(|m| !reviewed_only || m.review_result)
            .map(ExportMessage::from)
            .collect();
        trees.push(ExportTree {
            message_tree_id,
            messages,
        });
    }
    Ok(trees)
}

/// Every tree currently in `READY_FOR_EXPORT`.
pub async fn export_all_ready_trees<S: MessageStore>(
    store: &S,
    reviewed_only: bool,
    include_deleted: bool,
) -> Result<Vec<ExportTree>> {
    let ids = store.ready_for_export_trees().await?;
    export_trees(store, &ids, reviewed_only, include_deleted).await
}

/// Every tree authored (as root) by `user_id`.
pub async fn export_all_user_trees<S: MessageStore>(
    store: &S,
    user_id: Uuid,
    reviewed_only: bool,
    include_deleted: bool,
) -> Result<Vec<ExportTree>> {
    let ids = store.trees_authored_by(user_id).await?;
    export_trees(store, &ids, reviewed_only, include_deleted).await
}

/// Serialize a bundle to pretty JSON.
pub fn to_json(trees: &[ExportTree]) -> Result<String> {
    serde_json::to_string_pretty(trees).map_err(|e| crate::error::ManagerError::Core(e.to_string()))
}

/// Serialize a bundle to gzip-compressed JSON bytes.
pub fn to_json_gz(trees: &[ExportTree]) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(trees).map_err(|e| crate::error::ManagerError::Core(e.to_string()))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| crate::error::ManagerError::Core(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| crate::error::ManagerError::Core(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryStore;
    use chrono::Utc;

    fn message(id: Uuid, tree_id: Uuid, reviewed: bool, deleted: bool) -> Message {
        Message {
            id,
            message_tree_id: tree_id,
            parent_id: None,
            depth: 0,
            role: Role::Prompter,
            text: "hello".into(),
            lang: "en".into(),
            review_count: 1,
            review_result: reviewed,
            deleted,
            ranking_count: 0,
            rank: None,
            user_id: Uuid::new_v4(),
            task_id: None,
            created_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn reviewed_only_drops_unreviewed_messages() {
        let store = InMemoryStore::new();
        let tree_id = Uuid::new_v4();
        store.seed_message(message(tree_id, tree_id, true, false));
        let unreviewed_id = Uuid::new_v4();
        let mut unreviewed = message(unreviewed_id, tree_id, false, false);
        unreviewed.parent_id = Some(tree_id);
        store.seed_message(unreviewed);

        let trees = export_trees(&store, &[tree_id], true, false).await.unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn include_deleted_keeps_soft_deleted_messages() {
        let store = InMemoryStore::new();
        let tree_id = Uuid::new_v4();
        store.seed_message(message(tree_id, tree_id, true, true));

        let without = export_trees(&store, &[tree_id], false, false).await.unwrap();
        assert_eq!(without[0].messages.len(), 0);
        let with = export_trees(&store, &[tree_id], false, true).await.unwrap();
        assert_eq!(with[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn bundle_round_trips_through_json() {
        let store = InMemoryStore::new();
        let tree_id = Uuid::new_v4();
        store.seed_message(message(tree_id, tree_id, true, false));
        let trees = export_trees(&store, &[tree_id], false, false).await.unwrap();

        let json = to_json(&trees).unwrap();
        let back: Vec<ExportTree> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), trees.len());

        let gz = to_json_gz(&trees).unwrap();
        assert!(!gz.is_empty());
    }
}
