//! CLI command implementations

pub mod activate_backlog;
pub mod ensure_tree_states;
pub mod export;
pub mod purge_user;
pub mod retry_scoring_failed;
pub mod stats;
