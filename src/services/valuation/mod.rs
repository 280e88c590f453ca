//! Comparable-sales valuation pipeline.
//!
//! cohort filter -> distance scorer -> price normalizer -> consensus filter ->
//! weighted estimator. Every stage is a pure function of the query, the
//! record set and an immutable `ScoringConfiguration`.

pub mod cohort;
pub mod consensus;
pub mod estimator;
pub mod normalize;
pub mod params;
pub mod powertrain;
pub mod scoring;
pub mod types;

pub use cohort::CohortOptions;
pub use params::{ConsensusParams, ModelParams, ScoringConfiguration, SharedParams};
pub use powertrain::{classify, PowertrainCluster};
pub use types::{
    PowertrainId, SaleStatus, ScoredComparable, TaxRegime, TireConfiguration, Valuation,
    ValuationQuery, VehicleModel, VehicleRecord,
};

use crate::error::ValuationResult;

/// Production entry point: full history, no leakage guard.
pub fn predict_price<'a>(
    query: &ValuationQuery,
    records: &'a [VehicleRecord],
    config: &ScoringConfiguration,
) -> ValuationResult<Valuation<'a>> {
    predict_price_with(query, records, config, &CohortOptions::default())
}

pub fn predict_price_with<'a>(
    query: &ValuationQuery,
    records: &'a [VehicleRecord],
    config: &ScoringConfiguration,
    options: &CohortOptions<'_>,
) -> ValuationResult<Valuation<'a>> {
    query.validate()?;
    config.validate()?;
    Ok(run_pipeline(query, records, config, options))
}

/// Pipeline body without boundary validation; the calibration loop validates
/// the configuration once per trial and builds queries from classified records.
pub(crate) fn run_pipeline<'a>(
    query: &ValuationQuery,
    records: &'a [VehicleRecord],
    config: &ScoringConfiguration,
    options: &CohortOptions<'_>,
) -> Valuation<'a> {
    let cohort = cohort::select_cohort(query, records, options);
    let cohort_size = cohort.len();
    if cohort.is_empty() {
        tracing::debug!(powertrain = %query.powertrain_id(), "empty cohort");
        return Valuation::empty(0);
    }

    let scored: Vec<ScoredComparable<'a>> = cohort
        .into_iter()
        .map(|record| {
            let distance = scoring::score_comparable(query, record, config);
            let price = normalize::normalize_price(query, record, config);
            ScoredComparable {
                record,
                score: distance.total,
                penalties: distance.penalties,
                original_price: price.original,
                adjusted_price: price.adjusted,
                adjustments: price.adjustments,
                weight: None,
                influence: None,
                outlier_reason: None,
            }
        })
        .collect();

    let selection = consensus::select_neighbors(scored, config);
    let mut neighbors = selection.neighbors;
    let estimate = estimator::weighted_estimate(&mut neighbors, config.shared.weight_exponent);

    tracing::debug!(
        powertrain = %query.powertrain_id(),
        cohort_size,
        neighbors = neighbors.len(),
        outliers = selection.outliers.len(),
        path = ?selection.path,
        "valuation funnel"
    );

    match estimate {
        Some(price) => Valuation {
            estimated_price: price,
            neighbors,
            outliers: selection.outliers,
            cohort_size,
            consensus_median: selection.median,
        },
        None => Valuation {
            outliers: selection.outliers,
            consensus_median: selection.median,
            ..Valuation::empty(cohort_size)
        },
    }
}
