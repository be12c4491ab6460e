//! `dendron ensure-tree-states`: reconcile any root lacking a tree state row
//! and re-run the advancing condition checks across active trees.

use dendron_core::config::TreeManagerConfig;
use dendron_manager::PgStore;

use crate::error::CliResult;

pub async fn run(store: &PgStore, config: &TreeManagerConfig) -> CliResult<()> {
    let mut rng = rand::thread_rng();
    dendron_manager::maintenance::ensure_tree_states(store, config, &mut rng).await?;
    tracing::info!("tree states reconciled");
    Ok(())
}
