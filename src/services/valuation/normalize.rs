use std::collections::BTreeMap;

use super::params::ScoringConfiguration;
use super::types::{ValuationQuery, VehicleRecord};

pub const ADJUSTMENT_HITCH: &str = "hitch";
pub const ADJUSTMENT_MILEAGE: &str = "mileage";

#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedPrice {
    pub original: f64,
    pub adjusted: f64,
    pub adjustments: BTreeMap<&'static str, f64>,
}

/// What the comparable would have sold for had it matched the query on hitch
/// and mileage. Independent of the distance penalties for the same attributes.
pub fn normalize_price(
    query: &ValuationQuery,
    record: &VehicleRecord,
    config: &ScoringConfiguration,
) -> AdjustedPrice {
    let mut adjustments = BTreeMap::new();
    let original = record.winning_bid;
    let mut adjusted = original;

    let hitch = match (query.wants_trailer_hitch, record.trailer_hitch) {
        (true, false) => config.shared.hitch_value,
        (false, true) => -config.shared.hitch_value,
        _ => 0.0,
    };
    if hitch != 0.0 {
        adjusted += hitch;
        adjustments.insert(ADJUSTMENT_HITCH, hitch);
    }

    // A comparable with more km than the query sold for less than the query's car is worth.
    let km_delta = f64::from(record.mileage_km) - f64::from(query.mileage_km);
    let mileage = km_delta * config.model_params(query.model).mileage_depreciation;
    if mileage.is_finite() && mileage.abs() > config.consensus.mileage_adjustment_deadband {
        adjusted += mileage;
        adjustments.insert(ADJUSTMENT_MILEAGE, mileage);
    }

    AdjustedPrice {
        original,
        adjusted,
        adjustments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::valuation::types::VehicleModel;
    use crate::test_support::{query, record};

    #[test]
    fn hitch_adjustment_is_signed() {
        let config = ScoringConfiguration::default();
        let hitch = config.shared.hitch_value;

        let mut wants = query();
        wants.wants_trailer_hitch = true;
        let mut lacks = record("lacks");
        lacks.trailer_hitch = false;
        let price = normalize_price(&wants, &lacks, &config);
        assert_eq!(price.adjusted, lacks.winning_bid + hitch);
        assert_eq!(price.adjustments[ADJUSTMENT_HITCH], hitch);

        let mut has = record("has");
        has.trailer_hitch = true;
        let price = normalize_price(&query(), &has, &config);
        assert_eq!(price.adjusted, has.winning_bid - hitch);

        let price = normalize_price(&wants, &has, &config);
        assert_eq!(price.adjusted, has.winning_bid);
        assert!(price.adjustments.is_empty());
    }

    #[test]
    fn mileage_adjustment_uses_model_rate() {
        let config = ScoringConfiguration::default();
        let q = query();
        let mut rec = record("a");
        rec.mileage_km = q.mileage_km + 20_000;
        let price = normalize_price(&q, &rec, &config);
        let expected = 20_000.0 * config.model_3.mileage_depreciation;
        assert!((price.adjusted - (rec.winning_bid + expected)).abs() < 1e-9);

        let mut qy = q.clone();
        qy.model = VehicleModel::ModelY;
        let price_y = normalize_price(&qy, &rec, &config);
        let expected_y = 20_000.0 * config.model_y.mileage_depreciation;
        assert!((price_y.adjustments[ADJUSTMENT_MILEAGE] - expected_y).abs() < 1e-9);
    }

    #[test]
    fn lower_mileage_comparable_is_adjusted_down() {
        let config = ScoringConfiguration::default();
        let q = query();
        let mut rec = record("a");
        rec.mileage_km = q.mileage_km - 10_000;
        let price = normalize_price(&q, &rec, &config);
        assert!(price.adjusted < rec.winning_bid);
    }

    #[test]
    fn sub_deadband_mileage_adjustment_is_dropped() {
        let config = ScoringConfiguration::default();
        let q = query();
        let mut rec = record("a");
        // 1000 km * 0.043 = 43 < 50
        rec.mileage_km = q.mileage_km + 1_000;
        let price = normalize_price(&q, &rec, &config);
        assert_eq!(price.adjusted, rec.winning_bid);
        assert!(!price.adjustments.contains_key(ADJUSTMENT_MILEAGE));
    }

    #[test]
    fn deadband_is_exclusive_at_its_edge() {
        let mut config = ScoringConfiguration::default();
        config.model_3.mileage_depreciation = 0.5;
        assert_eq!(config.consensus.mileage_adjustment_deadband, 50.0);
        let q = query();

        // 100 km * 0.5 = 50: exactly at the deadband, dropped.
        let mut at_edge = record("edge");
        at_edge.mileage_km = q.mileage_km + 100;
        let price = normalize_price(&q, &at_edge, &config);
        assert_eq!(price.adjusted, at_edge.winning_bid);
        assert!(!price.adjustments.contains_key(ADJUSTMENT_MILEAGE));

        let mut below = record("below");
        below.mileage_km = q.mileage_km - 100;
        let price = normalize_price(&q, &below, &config);
        assert!(price.adjustments.is_empty());

        // 102 km * 0.5 = 51: just past it, applied in full.
        let mut past_edge = record("past");
        past_edge.mileage_km = q.mileage_km + 102;
        let price = normalize_price(&q, &past_edge, &config);
        assert_eq!(price.adjustments[ADJUSTMENT_MILEAGE], 51.0);
        assert_eq!(price.adjusted, past_edge.winning_bid + 51.0);
    }
}
