//! `dendron stats`: print tree-state counts and message-count aggregates.

use dendron_manager::{maintenance, PgStore};

use crate::error::CliResult;

pub async fn run(store: &PgStore) -> CliResult<()> {
    let stats = maintenance::stats(store).await?;

    println!("trees by state:");
    let mut states: Vec<_> = stats.trees_by_state.iter().collect();
    states.sort_by_key(|(state, _)| state.to_string());
    for (state, count) in states {
        println!("  {state:<24} {count}");
    }
    println!("messages per tree: avg {:.2}, min {}, max {}", stats.avg_messages_per_tree, stats.min_messages_per_tree, stats.max_messages_per_tree);

    Ok(())
}
