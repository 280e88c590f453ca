use crate::services::valuation::powertrain::PowertrainCluster;
use crate::services::valuation::types::{
    SaleStatus, ScoredComparable, TaxRegime, TireConfiguration, ValuationQuery, VehicleModel,
    VehicleRecord,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

/// Pre-facelift Model 3 Long Range, margin-taxed, sold accepted in March 2024.
pub fn record(auction_id: &str) -> VehicleRecord {
    VehicleRecord {
        auction_id: auction_id.to_string(),
        model: VehicleModel::Model3,
        power_kw: 300.0,
        battery_kwh: 75.0,
        facelift: false,
        tax_regime: TaxRegime::MarginTaxed,
        mileage_km: 30_000,
        registration_date: date(2021, 6, 1),
        accident_free: true,
        trailer_hitch: false,
        tires: TireConfiguration::FourSummer,
        status: SaleStatus::Accepted,
        close_date: date(2024, 3, 1),
        winning_bid: 30_000.0,
    }
}

/// Query that matches `record` on every hard attribute, valued on 2024-06-01.
pub fn query() -> ValuationQuery {
    ValuationQuery {
        model: VehicleModel::Model3,
        powertrain: PowertrainCluster::LongRange,
        registration_date: date(2021, 6, 1),
        mileage_km: 30_000,
        wants_net_pricing: false,
        wants_trailer_hitch: false,
        wants_accident_free: true,
        tires: TireConfiguration::FourSummer,
        facelift: false,
        reference_date: date(2024, 6, 1),
    }
}

/// Candidate with a fixed score and an unadjusted price.
pub fn scored(record: &VehicleRecord, score: f64) -> ScoredComparable<'_> {
    ScoredComparable {
        record,
        score,
        penalties: BTreeMap::new(),
        original_price: record.winning_bid,
        adjusted_price: record.winning_bid,
        adjustments: BTreeMap::new(),
        weight: None,
        influence: None,
        outlier_reason: None,
    }
}
