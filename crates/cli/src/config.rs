//! Loads a [`TreeManagerConfig`] from an optional JSON file and layers
//! environment-variable overrides for the debug flags on top, mirroring the
//! donor CLI's `Config::from_file` / `Config::merge` pattern.

use std::fs;
use std::path::Path;

use dendron_core::config::TreeManagerConfig;

use crate::error::{CliError, CliResult};

/// Load a partial config file (if given) over the compiled-in defaults, then
/// apply `DENDRON_DEBUG_*` environment overrides.
pub fn load<P: AsRef<Path>>(path: Option<P>) -> CliResult<TreeManagerConfig> {
    let mut config = TreeManagerConfig::default();

    if let Some(path) = path {
        let file_config = from_file(path)?;
        config.merge(file_config);
    }

    apply_env_overrides(&mut config);
    Ok(config)
}

fn from_file<P: AsRef<Path>>(path: P) -> CliResult<TreeManagerConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("failed to read config file: {e}")))?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::Config(format!("failed to parse config file: {e}")))
}

fn apply_env_overrides(config: &mut TreeManagerConfig) {
    if let Some(flag) = bool_env("DENDRON_DEBUG_ALLOW_SELF_LABELING") {
        config.debug_allow_self_labeling = flag;
    }
    if let Some(flag) = bool_env("DENDRON_DEBUG_ALLOW_DUPLICATE_TASKS") {
        config.debug_allow_duplicate_tasks = flag;
    }
    if let Some(flag) = bool_env("DENDRON_DEBUG_SKIP_EMBEDDING_COMPUTATION") {
        config.debug_skip_embedding_computation = flag;
    }
    if let Some(flag) = bool_env("DENDRON_DEBUG_SKIP_TOXICITY_CALCULATION") {
        config.debug_skip_toxicity_calculation = flag;
    }
}

fn bool_env(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load::<&str>(None).unwrap();
        assert_eq!(config.goal_tree_size, TreeManagerConfig::default().goal_tree_size);
    }

    #[test]
    fn env_override_flips_debug_flag() {
        std::env::set_var("DENDRON_DEBUG_ALLOW_SELF_LABELING", "true");
        let config = load::<&str>(None).unwrap();
        assert!(config.debug_allow_self_labeling);
        std::env::remove_var("DENDRON_DEBUG_ALLOW_SELF_LABELING");
    }
}
