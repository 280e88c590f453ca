use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::presets::Preset;
use crate::services::valuation::ScoringConfiguration;

/// Points at a JSON scoring configuration used when no `--config` is given.
pub const SCORING_CONFIG_ENV: &str = "VALUATION_SCORING_CONFIG_PATH";

pub(crate) fn scoring_config_path_from_env() -> Option<PathBuf> {
    std::env::var(SCORING_CONFIG_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Parses and validates a scoring configuration file. Missing fields take
/// the production defaults.
pub fn read_scoring_config(path: &Path) -> Result<ScoringConfiguration> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scoring config {}", path.display()))?;
    let config: ScoringConfiguration = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse scoring config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid scoring config {}", path.display()))?;
    Ok(config)
}

/// Explicit file, then `VALUATION_SCORING_CONFIG_PATH`, then the named preset.
pub fn load_scoring_config(explicit: Option<&Path>, preset: Preset) -> Result<ScoringConfiguration> {
    resolve_scoring_config(explicit, scoring_config_path_from_env().as_deref(), preset)
}

/// Explicit file, then the named preset. Ignores `VALUATION_SCORING_CONFIG_PATH`
/// so a search baseline is exactly what its flags say.
pub fn load_baseline_config(explicit: Option<&Path>, preset: Preset) -> Result<ScoringConfiguration> {
    resolve_scoring_config(explicit, None, preset)
}

fn resolve_scoring_config(
    explicit: Option<&Path>,
    from_env: Option<&Path>,
    preset: Preset,
) -> Result<ScoringConfiguration> {
    if let Some(path) = explicit.or(from_env) {
        tracing::info!(path = %path.display(), "loading scoring config file");
        return read_scoring_config(path);
    }
    let config = preset.config().clone();
    config
        .validate()
        .with_context(|| format!("invalid {preset} preset"))?;
    Ok(config)
}
