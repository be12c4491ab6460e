//! Worker submissions ingested by the interaction handler.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A worker submission, as received from the frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interaction {
    TextReplyToMessage {
        message_id: Uuid,
        user_message_id: Uuid,
        user_id: Uuid,
        text: String,
        lang: String,
    },
    MessageRating {
        message_id: Uuid,
        user_id: Uuid,
        rating: i32,
    },
    MessageRanking {
        message_id: Uuid,
        user_id: Uuid,
        task_id: Uuid,
        ranked_message_ids: Vec<Uuid>,
    },
    TextLabels {
        message_id: Uuid,
        user_id: Uuid,
        task_id: Option<Uuid>,
        labels: HashMap<String, f64>,
    },
}
