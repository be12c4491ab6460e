//! `dendron purge-user`: hard-delete a user's messages and disable their
//! account.

use uuid::Uuid;

use dendron_core::config::TreeManagerConfig;
use dendron_manager::PgStore;

use crate::error::CliResult;

pub async fn run(store: &PgStore, config: &TreeManagerConfig, user_id: Uuid) -> CliResult<()> {
    let mut rng = rand::thread_rng();
    dendron_manager::maintenance::purge_user(store, config, user_id, &mut rng).await?;
    tracing::info!(%user_id, "user purged");
    Ok(())
}
