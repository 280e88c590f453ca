use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;
use std::sync::OnceLock;
use tracing::error;

use crate::services::valuation::ScoringConfiguration;

const PRESETS_JSON: &str = include_str!("../presets/scoring.json");

static PRESETS: OnceLock<ScoringPresets> = OnceLock::new();

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScoringPresets {
    pub production: ScoringConfiguration,
    pub experimental: ScoringConfiguration,
    /// One parameter set for both models; search improvement is reported against it.
    pub unified_baseline: ScoringConfiguration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Preset {
    #[default]
    Production,
    Experimental,
    UnifiedBaseline,
}

impl Preset {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Experimental => "experimental",
            Self::UnifiedBaseline => "unified-baseline",
        }
    }

    pub fn config(self) -> &'static ScoringConfiguration {
        let presets = presets();
        match self {
            Self::Production => &presets.production,
            Self::Experimental => &presets.experimental,
            Self::UnifiedBaseline => &presets.unified_baseline,
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn presets() -> &'static ScoringPresets {
    PRESETS.get_or_init(|| match serde_json::from_str(PRESETS_JSON) {
        Ok(presets) => presets,
        Err(err) => {
            error!(
                error = %err,
                "Invalid presets/scoring.json; falling back to compiled production defaults"
            );
            ScoringPresets {
                production: ScoringConfiguration::default(),
                experimental: ScoringConfiguration::default(),
                unified_baseline: ScoringConfiguration::default(),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_file_parses_and_is_stable() {
        let raw: ScoringPresets =
            serde_json::from_str(PRESETS_JSON).expect("preset file must parse");
        assert_eq!(raw, *presets());
    }

    #[test]
    fn production_preset_matches_compiled_defaults() {
        assert_eq!(*Preset::Production.config(), ScoringConfiguration::default());
    }

    #[test]
    fn every_preset_validates() {
        for preset in Preset::value_variants() {
            preset
                .config()
                .validate()
                .unwrap_or_else(|err| panic!("{preset} preset invalid: {err}"));
        }
    }

    #[test]
    fn unified_baseline_shares_model_params() {
        let config = Preset::UnifiedBaseline.config();
        assert_eq!(config.model_3, config.model_y);
        assert_eq!(config.shared.neighbor_count, 9);
    }

    #[test]
    fn names_round_trip_through_clap() {
        for preset in Preset::value_variants() {
            let parsed = Preset::from_str(preset.as_str(), false).expect("parse preset");
            assert_eq!(parsed, *preset);
        }
    }
}
