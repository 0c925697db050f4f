//! Run configuration loading and fingerprinting.

use anyhow::{Context, Result};
use sectorlab_core::StrategyConfig;
use std::path::Path;

/// Load a [`StrategyConfig`] from a TOML file. Missing fields fall back to
/// their defaults, so a config file only states what it overrides.
pub fn load_strategy_config(path: &Path) -> Result<StrategyConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: StrategyConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Deterministic content hash of a config. Two runs with identical configs
/// share the same id, which makes exported artifacts comparable.
pub fn run_id(config: &StrategyConfig) -> String {
    let json = serde_json::to_string(config).expect("StrategyConfig serialization failed");
    blake3::hash(json.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(
            &path,
            r#"
trigger_threshold = 0.1
laggard_pct = 0.5
hold_days = 20
"#,
        )
        .unwrap();
        let config = load_strategy_config(&path).unwrap();
        assert_eq!(config.trigger_threshold, 0.1);
        assert_eq!(config.hold_days, 20);
        // Untouched fields keep their defaults.
        assert_eq!(config.top_industry_n, 3);
    }

    #[test]
    fn run_id_is_deterministic_and_config_sensitive() {
        let a = StrategyConfig::default();
        let b = StrategyConfig {
            trigger_threshold: 0.9,
            ..Default::default()
        };
        assert_eq!(run_id(&a), run_id(&a));
        assert_ne!(run_id(&a), run_id(&b));
    }
}
