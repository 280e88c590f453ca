use super::powertrain::PowertrainCluster;
use super::types::{ValuationQuery, VehicleRecord};

/// Extra cohort restrictions used when backtesting.
#[derive(Debug, Clone, Copy, Default)]
pub struct CohortOptions<'q> {
    /// Drop comparables that closed after the query's reference date.
    /// Always on for calibration; production may leave it off to use full history.
    pub leakage_guard: bool,
    /// Leave-one-out: the record being valued must not price itself.
    pub exclude_auction_id: Option<&'q str>,
}

impl<'q> CohortOptions<'q> {
    pub fn backtest(exclude_auction_id: &'q str) -> Self {
        Self {
            leakage_guard: true,
            exclude_auction_id: Some(exclude_auction_id),
        }
    }
}

/// Hard-match filter: same model, same powertrain cluster, same facelift
/// generation, same tax regime and a positive winning bid.
pub fn is_comparable(query: &ValuationQuery, record: &VehicleRecord, options: &CohortOptions<'_>) -> bool {
    if !record.has_valid_bid() {
        return false;
    }
    if record.model != query.model {
        return false;
    }
    if record.facelift != query.facelift {
        return false;
    }
    if record.tax_regime.is_net() != query.wants_net_pricing {
        return false;
    }
    if options.leakage_guard && record.close_date > query.reference_date {
        return false;
    }
    if options
        .exclude_auction_id
        .is_some_and(|id| id == record.auction_id)
    {
        return false;
    }
    // Classification last: it is the only non-trivial check. Unknown is a
    // catch-all, not a cohort.
    match record.powertrain() {
        Some(PowertrainCluster::Unknown) | None => false,
        Some(cluster) => cluster == query.powertrain,
    }
}

pub fn select_cohort<'a>(
    query: &ValuationQuery,
    records: &'a [VehicleRecord],
    options: &CohortOptions<'_>,
) -> Vec<&'a VehicleRecord> {
    records
        .iter()
        .filter(|record| is_comparable(query, record, options))
        .collect()
}
