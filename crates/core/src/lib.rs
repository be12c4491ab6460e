#![warn(missing_docs)]

//! Domain model, configuration, and error types shared by the tree manager
//! and its CLI: message/tree/task/label/reaction types, the tree-state
//! enum, the `HfClient` trait for external scoring services, and the
//! crate-wide error type.

pub mod config;
pub mod error;
pub mod hf;
pub mod interaction;
pub mod labels;
pub mod model;
pub mod state;
pub mod task;

pub use config::TreeManagerConfig;
pub use error::{DendronError, Result};
pub use hf::{HfClient, ToxicityScore};
pub use interaction::Interaction;
pub use labels::{LabelTaskDisposition, LabelTaskMode, TextLabel};
pub use model::{Message, MessageReaction, MessageTreeState, Role, Task, TextLabels};
pub use state::TreeState;
pub use task::{Conversation, ConversationMessage, LabelDescription, TaskPayload, TaskRequestType};

/// Core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
