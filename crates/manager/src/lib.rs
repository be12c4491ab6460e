#![warn(missing_docs)]

//! `dendron-manager` — the Tree Manager itself: the query layer over a
//! relational message store, the acceptance evaluator, the ranked-pairs
//! consensus engine, the tree state machine, the task dispatcher, the
//! interaction handler, and the bulk maintenance routines (§2 of the
//! design spec).
//!
//! `dendron-core` carries the shared domain model; this crate is where
//! that model is put to work against a [`store::MessageStore`] — either the
//! `sqlx`/Postgres-backed [`pg_store::PgStore`] or the in-process
//! [`in_memory::InMemoryStore`] test double.

pub mod acceptance;
pub mod availability;
pub mod consensus;
pub mod dispatcher;
pub mod error;
pub mod export;
pub mod hf_client;
pub mod in_memory;
pub mod interaction;
pub mod maintenance;
pub mod pg_store;
pub mod rows;
pub mod state_machine;
pub mod store;

pub use dispatcher::{next_task, DispatchedTask};
pub use error::{ManagerError, Result};
pub use hf_client::{HuggingFaceClient, HuggingFaceConfig, NoopHfClient};
pub use in_memory::InMemoryStore;
pub use interaction::handle_interaction;
pub use pg_store::PgStore;
pub use store::MessageStore;

/// Manager crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
