//! `dendron activate-backlog`: roll the backlog-activation probability (or
//! floor check) for a single language and promote a tree if it fires.

use dendron_core::config::TreeManagerConfig;
use dendron_manager::PgStore;

use crate::error::CliResult;

pub async fn run(store: &PgStore, config: &TreeManagerConfig, lang: &str) -> CliResult<()> {
    let mut rng = rand::thread_rng();
    dendron_manager::maintenance::activate_backlog_tree(store, config, lang, &mut rng).await?;
    tracing::info!(lang, "backlog activation check ran");
    Ok(())
}
