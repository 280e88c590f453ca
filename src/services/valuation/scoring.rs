use std::collections::BTreeMap;

use super::params::ScoringConfiguration;
use super::types::{SaleStatus, ValuationQuery, VehicleRecord};
use crate::time::{days_between, whole_months_between};

pub const PENALTY_RECENCY: &str = "recency";
pub const PENALTY_AGE: &str = "age";
pub const PENALTY_MILEAGE: &str = "mileage";
pub const PENALTY_ACCIDENT: &str = "accident";
pub const PENALTY_TIRE_QUANTITY: &str = "tire_quantity";
pub const PENALTY_TIRE_TYPE: &str = "tire_type";
pub const PENALTY_STATUS: &str = "status";

/// Non-negative dissimilarity between a query and one cohort member.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceScore {
    pub total: f64,
    pub penalties: BTreeMap<&'static str, f64>,
}

impl DistanceScore {
    fn add(&mut self, factor: &'static str, points: f64) {
        let points = if points.is_finite() { points.max(0.0) } else { 0.0 };
        self.total += points;
        *self.penalties.entry(factor).or_insert(0.0) += points;
    }
}

/// Sums the additive penalty terms. Recency, age and mileage are always
/// recorded (even at zero); the flat mismatch penalties only when they apply.
pub fn score_comparable(
    query: &ValuationQuery,
    record: &VehicleRecord,
    config: &ScoringConfiguration,
) -> DistanceScore {
    let shared = &config.shared;
    let model = config.model_params(query.model);
    let mut score = DistanceScore {
        total: 0.0,
        penalties: BTreeMap::new(),
    };

    // Market drift proxy: distance in time between "now" and the sale.
    let days = days_between(query.reference_date, record.close_date).abs() as f64;
    score.add(PENALTY_RECENCY, days * shared.recency_penalty_per_day);

    // Relative age: the query's age today vs the comparable's age when it sold.
    let age_target = whole_months_between(query.reference_date, query.registration_date);
    let age_comp = whole_months_between(record.close_date, record.registration_date);
    let months = (age_target - age_comp).abs() as f64;
    score.add(
        PENALTY_AGE,
        months * model.age_penalty + months * months * model.age_quadratic_penalty,
    );

    let km = (f64::from(query.mileage_km) - f64::from(record.mileage_km)).abs();
    score.add(PENALTY_MILEAGE, km * model.mileage_distance_penalty);

    if query.wants_accident_free != record.accident_free {
        score.add(PENALTY_ACCIDENT, shared.accident_penalty);
    }

    match (query.tires.is_eight(), record.tires.is_eight()) {
        (true, false) => score.add(PENALTY_TIRE_QUANTITY, shared.tire_user_wants_8_penalty),
        (false, true) => score.add(PENALTY_TIRE_QUANTITY, shared.tire_user_wants_4_penalty),
        (false, false) if query.tires != record.tires => {
            score.add(PENALTY_TIRE_TYPE, shared.tire_type_penalty)
        }
        _ => {}
    }

    if record.status != SaleStatus::Accepted {
        score.add(PENALTY_STATUS, shared.status_penalty);
    }

    score
}
