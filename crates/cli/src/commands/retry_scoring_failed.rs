//! `dendron retry-scoring-failed`: re-attempt consensus scoring for every
//! tree stuck in `SCORING_FAILED`.

use dendron_core::config::TreeManagerConfig;
use dendron_manager::PgStore;

use crate::error::CliResult;

pub async fn run(store: &PgStore, config: &TreeManagerConfig) -> CliResult<()> {
    dendron_manager::maintenance::retry_scoring_failed_message_trees(store, config).await?;
    tracing::info!("scoring-failed trees retried");
    Ok(())
}
