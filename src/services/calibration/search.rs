use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::loo::{evaluate, EvaluationSummary};
use crate::error::{ValuationError, ValuationResult};
use crate::services::valuation::{ModelParams, ScoringConfiguration, SharedParams, VehicleRecord};

/// Closed sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn sample(&self, rng: &mut StdRng) -> f64 {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }

    pub fn sample_count(&self, rng: &mut StdRng) -> usize {
        let lo = self.min.max(1.0).round() as usize;
        let hi = self.max.max(1.0).round() as usize;
        if hi <= lo {
            return lo;
        }
        rng.gen_range(lo..=hi)
    }

    fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min >= 0.0 && self.min <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpace {
    pub age_penalty: Range,
    pub age_quadratic_penalty: Range,
    pub mileage_distance_penalty: Range,
    pub mileage_depreciation: Range,
}

impl ModelSpace {
    fn sample(&self, rng: &mut StdRng) -> ModelParams {
        ModelParams {
            age_penalty: self.age_penalty.sample(rng),
            age_quadratic_penalty: self.age_quadratic_penalty.sample(rng),
            mileage_distance_penalty: self.mileage_distance_penalty.sample(rng),
            mileage_depreciation: self.mileage_depreciation.sample(rng),
        }
    }

    fn ranges(&self) -> [(&'static str, Range); 4] {
        [
            ("age_penalty", self.age_penalty),
            ("age_quadratic_penalty", self.age_quadratic_penalty),
            ("mileage_distance_penalty", self.mileage_distance_penalty),
            ("mileage_depreciation", self.mileage_depreciation),
        ]
    }
}

/// Bounded search ranges: one shared block plus one block per model, since the
/// two models depreciate at different rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub recency_penalty_per_day: Range,
    pub accident_penalty: Range,
    pub tire_user_wants_8_penalty: Range,
    pub tire_user_wants_4_penalty: Range,
    pub tire_type_penalty: Range,
    pub status_penalty: Range,
    pub hitch_value: Range,
    /// Rounded to whole neighbors.
    pub neighbor_count: Range,
    pub weight_exponent: Range,
    pub model_3: ModelSpace,
    pub model_y: ModelSpace,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            recency_penalty_per_day: Range::new(0.1, 0.4),
            accident_penalty: Range::new(20.0, 80.0),
            tire_user_wants_8_penalty: Range::new(20.0, 60.0),
            tire_user_wants_4_penalty: Range::new(15.0, 50.0),
            tire_type_penalty: Range::new(1.0, 20.0),
            status_penalty: Range::new(50.0, 150.0),
            hitch_value: Range::new(150.0, 350.0),
            neighbor_count: Range::new(5.0, 12.0),
            weight_exponent: Range::new(1.5, 5.0),
            model_3: ModelSpace {
                age_penalty: Range::new(4.0, 15.0),
                age_quadratic_penalty: Range::new(0.0, 0.2),
                mileage_distance_penalty: Range::new(0.0005, 0.004),
                mileage_depreciation: Range::new(0.03, 0.08),
            },
            model_y: ModelSpace {
                age_penalty: Range::new(8.0, 20.0),
                age_quadratic_penalty: Range::new(0.0, 0.2),
                mileage_distance_penalty: Range::new(0.0005, 0.005),
                mileage_depreciation: Range::new(0.04, 0.10),
            },
        }
    }
}

impl SearchSpace {
    pub fn validate(&self) -> ValuationResult<()> {
        let shared = [
            ("recency_penalty_per_day", self.recency_penalty_per_day),
            ("accident_penalty", self.accident_penalty),
            ("tire_user_wants_8_penalty", self.tire_user_wants_8_penalty),
            ("tire_user_wants_4_penalty", self.tire_user_wants_4_penalty),
            ("tire_type_penalty", self.tire_type_penalty),
            ("status_penalty", self.status_penalty),
            ("hitch_value", self.hitch_value),
            ("neighbor_count", self.neighbor_count),
            ("weight_exponent", self.weight_exponent),
        ];
        let per_model = [("model_3", &self.model_3), ("model_y", &self.model_y)]
            .into_iter()
            .flat_map(|(label, space)| {
                space
                    .ranges()
                    .into_iter()
                    .map(move |(name, range)| (format!("{label}.{name}"), range))
            });
        for (name, range) in shared
            .into_iter()
            .map(|(name, range)| (name.to_string(), range))
            .chain(per_model)
        {
            if !range.is_valid() {
                return Err(ValuationError::invalid_config(format!(
                    "search range {name} must satisfy 0 <= min <= max; got {}..{}",
                    range.min, range.max
                )));
            }
        }
        Ok(())
    }

    /// Draws one candidate. Consensus/normalization tunables are not searched
    /// and are copied from `baseline`.
    pub fn sample(&self, rng: &mut StdRng, baseline: &ScoringConfiguration) -> ScoringConfiguration {
        let shared = SharedParams {
            recency_penalty_per_day: self.recency_penalty_per_day.sample(rng),
            accident_penalty: self.accident_penalty.sample(rng),
            tire_user_wants_8_penalty: self.tire_user_wants_8_penalty.sample(rng),
            tire_user_wants_4_penalty: self.tire_user_wants_4_penalty.sample(rng),
            tire_type_penalty: self.tire_type_penalty.sample(rng),
            status_penalty: self.status_penalty.sample(rng),
            hitch_value: self.hitch_value.sample(rng),
            neighbor_count: self.neighbor_count.sample_count(rng),
            weight_exponent: self.weight_exponent.sample(rng),
        };
        ScoringConfiguration {
            shared,
            model_3: self.model_3.sample(rng),
            model_y: self.model_y.sample(rng),
            consensus: baseline.consensus.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub trials: usize,
    pub seed: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            trials: 2_000,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialImprovement {
    /// 1-based trial number.
    pub trial: usize,
    pub median_error_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub baseline: EvaluationSummary,
    pub best_config: ScoringConfiguration,
    pub best: EvaluationSummary,
    /// `(baseline - best) / baseline * 100`; `None` when the baseline median is unusable.
    pub improvement_pct: Option<f64>,
    pub improvements: Vec<TrialImprovement>,
    pub trials_run: usize,
    pub trials_invalid: usize,
}

/// Relative reduction of the median error against the baseline, in percent.
pub fn improvement_pct(baseline: &EvaluationSummary, best: &EvaluationSummary) -> Option<f64> {
    let base = baseline.median_error_pct?;
    let best = best.median_error_pct?;
    (base > 0.0).then(|| (base - best) / base * 100.0)
}

/// Seeded random search keeping the lowest median error seen so far.
///
/// The baseline is evaluated first and is the incumbent until a candidate is
/// strictly better. The same seed, space and records always yield the same
/// outcome.
pub fn random_search(
    records: &[VehicleRecord],
    baseline: &ScoringConfiguration,
    space: &SearchSpace,
    options: SearchOptions,
) -> ValuationResult<SearchOutcome> {
    space.validate()?;
    let baseline_summary = evaluate(baseline, records)?;
    tracing::info!(
        median = ?baseline_summary.median_error_pct,
        evaluated = baseline_summary.evaluated_count,
        "baseline evaluated"
    );

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut best_config = baseline.clone();
    let mut best = baseline_summary.clone();
    let mut improvements = Vec::new();
    let mut trials_invalid = 0usize;

    for trial in 1..=options.trials {
        let candidate = space.sample(&mut rng, baseline);
        let summary = match evaluate(&candidate, records) {
            Ok(summary) => summary,
            Err(err) => {
                trials_invalid += 1;
                tracing::debug!(trial, error = %err, "skipping invalid candidate");
                continue;
            }
        };
        if summary.objective() < best.objective() {
            let median_error_pct = summary.objective();
            tracing::info!(
                trial,
                median = median_error_pct,
                mean = ?summary.mean_error_pct,
                neighbor_count = candidate.shared.neighbor_count,
                "new best configuration"
            );
            improvements.push(TrialImprovement {
                trial,
                median_error_pct,
            });
            best_config = candidate;
            best = summary;
        }
    }

    let improvement_pct = improvement_pct(&baseline_summary, &best);
    Ok(SearchOutcome {
        baseline: baseline_summary,
        best_config,
        best,
        improvement_pct,
        improvements,
        trials_run: options.trials,
        trials_invalid,
    })
}
