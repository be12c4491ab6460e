//! Task request types and the task descriptors the dispatcher builds.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::labels::{LabelTaskDisposition, LabelTaskMode};

/// The kind of task a worker (or the random picker) can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRequestType {
    Random,
    InitialPrompt,
    PrompterReply,
    AssistantReply,
    LabelInitialPrompt,
    LabelPrompterReply,
    LabelAssistantReply,
    RankPrompterReplies,
    RankAssistantReplies,
}

/// All non-random task request types, used to build the availability table.
pub const ALL_SPECIFIC_TASK_TYPES: &[TaskRequestType] = &[
    TaskRequestType::InitialPrompt,
    TaskRequestType::PrompterReply,
    TaskRequestType::AssistantReply,
    TaskRequestType::LabelInitialPrompt,
    TaskRequestType::LabelPrompterReply,
    TaskRequestType::LabelAssistantReply,
    TaskRequestType::RankPrompterReplies,
    TaskRequestType::RankAssistantReplies,
];

/// A single turn of a conversation, as handed to a worker for context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub text: String,
    pub role: crate::model::Role,
}

/// The full path from root to the task's anchor message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<ConversationMessage>,
}

/// Description of a single selectable label, as shown to the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelDescription {
    pub name: String,
    pub display_text: String,
    pub help_text: String,
}

/// The concrete task descriptor built by the dispatcher for a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskPayload {
    InitialPrompt,
    PrompterReply {
        conversation: Conversation,
    },
    AssistantReply {
        conversation: Conversation,
    },
    RankPrompterReplies {
        conversation: Conversation,
        replies: Vec<String>,
        reply_message_ids: Vec<Uuid>,
        ranking_parent_id: Uuid,
    },
    RankAssistantReplies {
        conversation: Conversation,
        replies: Vec<String>,
        reply_message_ids: Vec<Uuid>,
        ranking_parent_id: Uuid,
    },
    LabelInitialPrompt {
        message_id: Uuid,
        prompt: String,
        valid_labels: Vec<String>,
        mandatory_labels: Vec<String>,
        mode: LabelTaskMode,
        disposition: LabelTaskDisposition,
        labels: Vec<LabelDescription>,
    },
    LabelPrompterReply {
        message_id: Uuid,
        conversation: Conversation,
        reply: String,
        valid_labels: Vec<String>,
        mandatory_labels: Vec<String>,
        mode: LabelTaskMode,
        disposition: LabelTaskDisposition,
        labels: Vec<LabelDescription>,
    },
    LabelAssistantReply {
        message_id: Uuid,
        conversation: Conversation,
        reply: String,
        valid_labels: Vec<String>,
        mandatory_labels: Vec<String>,
        mode: LabelTaskMode,
        disposition: LabelTaskDisposition,
        labels: Vec<LabelDescription>,
    },
}
