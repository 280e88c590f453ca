use serde::{Deserialize, Serialize};

use super::types::VehicleModel;
use crate::error::{ValuationError, ValuationResult};

/// Parameters that apply to both models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedParams {
    #[serde(default = "default_recency_penalty_per_day")]
    pub recency_penalty_per_day: f64,
    #[serde(default = "default_accident_penalty")]
    pub accident_penalty: f64,
    /// Query wants eight tires, comparable has a single set.
    #[serde(default = "default_tire_wants_8_penalty")]
    pub tire_user_wants_8_penalty: f64,
    /// Query wants a single set, comparable has eight tires.
    #[serde(default = "default_tire_wants_4_penalty")]
    pub tire_user_wants_4_penalty: f64,
    #[serde(default = "default_tire_type_penalty")]
    pub tire_type_penalty: f64,
    #[serde(default = "default_status_penalty")]
    pub status_penalty: f64,
    /// Currency value of a trailer hitch.
    #[serde(default = "default_hitch_value")]
    pub hitch_value: f64,
    #[serde(default = "default_neighbor_count")]
    pub neighbor_count: usize,
    #[serde(default = "default_weight_exponent")]
    pub weight_exponent: f64,
}

fn default_recency_penalty_per_day() -> f64 {
    0.40
}

fn default_accident_penalty() -> f64 {
    21.0
}

fn default_tire_wants_8_penalty() -> f64 {
    34.0
}

fn default_tire_wants_4_penalty() -> f64 {
    25.0
}

fn default_tire_type_penalty() -> f64 {
    5.0
}

fn default_status_penalty() -> f64 {
    148.0
}

fn default_hitch_value() -> f64 {
    298.0
}

fn default_neighbor_count() -> usize {
    5
}

fn default_weight_exponent() -> f64 {
    1.98
}

impl Default for SharedParams {
    fn default() -> Self {
        Self {
            recency_penalty_per_day: default_recency_penalty_per_day(),
            accident_penalty: default_accident_penalty(),
            tire_user_wants_8_penalty: default_tire_wants_8_penalty(),
            tire_user_wants_4_penalty: default_tire_wants_4_penalty(),
            tire_type_penalty: default_tire_type_penalty(),
            status_penalty: default_status_penalty(),
            hitch_value: default_hitch_value(),
            neighbor_count: default_neighbor_count(),
            weight_exponent: default_weight_exponent(),
        }
    }
}

/// Per-model age and mileage coefficients. The two models depreciate at
/// materially different rates, so these are never shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Points per month of relative-age difference.
    pub age_penalty: f64,
    /// Points per squared month of relative-age difference.
    pub age_quadratic_penalty: f64,
    /// Points per km of mileage difference (scoring only).
    pub mileage_distance_penalty: f64,
    /// Currency per km used to normalize comparable prices.
    pub mileage_depreciation: f64,
}

impl ModelParams {
    pub fn production_model_3() -> Self {
        Self {
            age_penalty: 11.2,
            age_quadratic_penalty: 0.165,
            mileage_distance_penalty: 0.0012,
            mileage_depreciation: 0.043,
        }
    }

    pub fn production_model_y() -> Self {
        Self {
            age_penalty: 11.9,
            age_quadratic_penalty: 0.073,
            mileage_distance_penalty: 0.0015,
            mileage_depreciation: 0.099,
        }
    }
}

/// Outlier-consensus and normalization tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Candidate pool is `pool_multiplier * neighbor_count` lowest-score comparables.
    #[serde(default = "default_pool_multiplier")]
    pub pool_multiplier: usize,
    /// Below this many candidates the median is not trusted and nothing is rejected.
    #[serde(default = "default_min_pool_for_median")]
    pub min_pool_for_median: usize,
    /// Relative deviation from the consensus median beyond which a candidate is dropped.
    #[serde(default = "default_max_relative_deviation")]
    pub max_relative_deviation: f64,
    /// Mileage price adjustments at or below this (absolute, currency) are dropped.
    #[serde(default = "default_mileage_adjustment_deadband")]
    pub mileage_adjustment_deadband: f64,
}

fn default_pool_multiplier() -> usize {
    3
}

fn default_min_pool_for_median() -> usize {
    3
}

fn default_max_relative_deviation() -> f64 {
    0.25
}

fn default_mileage_adjustment_deadband() -> f64 {
    50.0
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            pool_multiplier: default_pool_multiplier(),
            min_pool_for_median: default_min_pool_for_median(),
            max_relative_deviation: default_max_relative_deviation(),
            mileage_adjustment_deadband: default_mileage_adjustment_deadband(),
        }
    }
}

/// Immutable parameter bundle passed into every pipeline call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfiguration {
    #[serde(default)]
    pub shared: SharedParams,
    #[serde(default = "ModelParams::production_model_3")]
    pub model_3: ModelParams,
    #[serde(default = "ModelParams::production_model_y")]
    pub model_y: ModelParams,
    #[serde(default)]
    pub consensus: ConsensusParams,
}

impl Default for ScoringConfiguration {
    fn default() -> Self {
        Self {
            shared: SharedParams::default(),
            model_3: ModelParams::production_model_3(),
            model_y: ModelParams::production_model_y(),
            consensus: ConsensusParams::default(),
        }
    }
}

impl ScoringConfiguration {
    pub fn model_params(&self, model: VehicleModel) -> &ModelParams {
        match model {
            VehicleModel::Model3 => &self.model_3,
            VehicleModel::ModelY => &self.model_y,
        }
    }

    pub fn neighbor_pool_size(&self) -> usize {
        self.shared
            .neighbor_count
            .saturating_mul(self.consensus.pool_multiplier.max(1))
    }

    pub fn validate(&self) -> ValuationResult<()> {
        let shared = &self.shared;
        let mut checks: Vec<(String, f64)> = vec![
            ("recency_penalty_per_day".to_string(), shared.recency_penalty_per_day),
            ("accident_penalty".to_string(), shared.accident_penalty),
            ("tire_user_wants_8_penalty".to_string(), shared.tire_user_wants_8_penalty),
            ("tire_user_wants_4_penalty".to_string(), shared.tire_user_wants_4_penalty),
            ("tire_type_penalty".to_string(), shared.tire_type_penalty),
            ("status_penalty".to_string(), shared.status_penalty),
            ("hitch_value".to_string(), shared.hitch_value),
            (
                "mileage_adjustment_deadband".to_string(),
                self.consensus.mileage_adjustment_deadband,
            ),
        ];
        for (label, params) in [("model_3", &self.model_3), ("model_y", &self.model_y)] {
            checks.push((format!("{label}.age_penalty"), params.age_penalty));
            checks.push((
                format!("{label}.age_quadratic_penalty"),
                params.age_quadratic_penalty,
            ));
            checks.push((
                format!("{label}.mileage_distance_penalty"),
                params.mileage_distance_penalty,
            ));
            checks.push((
                format!("{label}.mileage_depreciation"),
                params.mileage_depreciation,
            ));
        }
        for (name, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(ValuationError::invalid_config(format!(
                    "{name} must be finite and >= 0; got {value}"
                )));
            }
        }

        if shared.neighbor_count == 0 {
            return Err(ValuationError::invalid_config(
                "neighbor_count must be >= 1",
            ));
        }
        if !shared.weight_exponent.is_finite() || shared.weight_exponent <= 0.0 {
            return Err(ValuationError::invalid_config(format!(
                "weight_exponent must be finite and > 0; got {}",
                shared.weight_exponent
            )));
        }
        if self.consensus.pool_multiplier == 0 {
            return Err(ValuationError::invalid_config(
                "pool_multiplier must be >= 1",
            ));
        }
        let deviation = self.consensus.max_relative_deviation;
        if !deviation.is_finite() || deviation <= 0.0 {
            return Err(ValuationError::invalid_config(format!(
                "max_relative_deviation must be finite and > 0; got {deviation}"
            )));
        }
        Ok(())
    }
}
