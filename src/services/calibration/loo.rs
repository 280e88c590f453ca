use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::ValuationResult;
use crate::services::robust;
use crate::services::valuation::cohort::CohortOptions;
use crate::services::valuation::{run_pipeline, ScoringConfiguration, ValuationQuery, VehicleRecord};

/// Per-record absolute percentage errors are capped here so a handful of
/// wild misses cannot dominate the mean.
pub const ERROR_CAP_PCT: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Outcome {
    Evaluated(f64),
    Ineligible,
    NoPrediction,
}

/// Leave-one-out accuracy of one configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationSummary {
    pub median_error_pct: Option<f64>,
    pub mean_error_pct: Option<f64>,
    pub p90_error_pct: Option<f64>,
    pub evaluated_count: usize,
    /// `skipped_ineligible + skipped_no_prediction`.
    pub skipped_count: usize,
    /// Zero bid, or a missing/unknown powertrain cluster.
    pub skipped_ineligible: usize,
    /// Cohort (after self-exclusion and the leakage guard) produced no neighbors.
    pub skipped_no_prediction: usize,
    /// Keyed by model label.
    pub per_model_median_pct: BTreeMap<String, f64>,
}

impl EvaluationSummary {
    /// Search objective: lower is better, and an empty evaluation never wins.
    pub fn objective(&self) -> f64 {
        self.median_error_pct.unwrap_or(f64::INFINITY)
    }
}

/// Absolute percentage error, capped at `ERROR_CAP_PCT`.
pub fn capped_error_pct(predicted: f64, actual: f64) -> f64 {
    (((predicted - actual).abs() / actual) * 100.0).min(ERROR_CAP_PCT)
}

fn evaluate_one(
    target: &VehicleRecord,
    records: &[VehicleRecord],
    config: &ScoringConfiguration,
) -> Outcome {
    if !target.has_valid_bid() {
        return Outcome::Ineligible;
    }
    // Reference date is the target's own close date, never wall-clock now.
    let Some(query) = ValuationQuery::from_record(target, target.close_date) else {
        return Outcome::Ineligible;
    };
    let options = CohortOptions::backtest(&target.auction_id);
    let valuation = run_pipeline(&query, records, config, &options);
    if !valuation.has_prediction() {
        return Outcome::NoPrediction;
    }
    Outcome::Evaluated(capped_error_pct(valuation.estimated_price, target.winning_bid))
}

#[cfg(feature = "rayon")]
fn evaluate_all(records: &[VehicleRecord], config: &ScoringConfiguration) -> Vec<Outcome> {
    use rayon::prelude::*;

    // Indexed collect keeps input order, so aggregates do not depend on scheduling.
    records
        .par_iter()
        .map(|target| evaluate_one(target, records, config))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn evaluate_all(records: &[VehicleRecord], config: &ScoringConfiguration) -> Vec<Outcome> {
    records
        .iter()
        .map(|target| evaluate_one(target, records, config))
        .collect()
}

/// Runs the leave-one-out backtest for `config` over `records`.
pub fn evaluate(
    config: &ScoringConfiguration,
    records: &[VehicleRecord],
) -> ValuationResult<EvaluationSummary> {
    config.validate()?;
    let outcomes = evaluate_all(records, config);

    let mut summary = EvaluationSummary::default();
    let mut errors = Vec::with_capacity(outcomes.len());
    let mut by_model: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (record, outcome) in records.iter().zip(outcomes) {
        match outcome {
            Outcome::Evaluated(error) => {
                errors.push(error);
                by_model
                    .entry(record.model.label().to_string())
                    .or_default()
                    .push(error);
            }
            Outcome::Ineligible => summary.skipped_ineligible += 1,
            Outcome::NoPrediction => summary.skipped_no_prediction += 1,
        }
    }

    summary.evaluated_count = errors.len();
    summary.skipped_count = summary.skipped_ineligible + summary.skipped_no_prediction;
    summary.median_error_pct = robust::median(&errors);
    summary.mean_error_pct = robust::mean(&errors);
    summary.p90_error_pct = robust::quantile(&errors, 0.90);
    summary.per_model_median_pct = by_model
        .into_iter()
        .filter_map(|(model, errs)| robust::median(&errs).map(|m| (model, m)))
        .collect();

    tracing::debug!(
        evaluated = summary.evaluated_count,
        skipped = summary.skipped_count,
        median = ?summary.median_error_pct,
        "leave-one-out evaluation"
    );
    Ok(summary)
}
