use chrono::{Duration, NaiveDate};
use ev_valuation::services::valuation::{
    classify, predict_price, predict_price_with, CohortOptions, PowertrainCluster, SaleStatus,
    ScoringConfiguration, TaxRegime, TireConfiguration, Valuation, ValuationQuery, VehicleModel,
    VehicleRecord,
};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

const MIN_PROPTEST_CASES: u32 = 256;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 1, 1).expect("valid epoch")
}

fn model_strategy() -> impl Strategy<Value = VehicleModel> {
    prop_oneof![Just(VehicleModel::Model3), Just(VehicleModel::ModelY)]
}

fn tires_strategy() -> impl Strategy<Value = TireConfiguration> {
    prop_oneof![
        Just(TireConfiguration::EightTires),
        Just(TireConfiguration::FourSummer),
        Just(TireConfiguration::FourWinter),
        Just(TireConfiguration::FourAllSeason),
    ]
}

fn status_strategy() -> impl Strategy<Value = SaleStatus> {
    prop_oneof![
        4 => Just(SaleStatus::Accepted),
        1 => Just(SaleStatus::Declined),
        1 => Just(SaleStatus::Other),
    ]
}

fn cluster_strategy() -> impl Strategy<Value = PowertrainCluster> {
    prop_oneof![
        Just(PowertrainCluster::StandardRange),
        Just(PowertrainCluster::LongRange),
        Just(PowertrainCluster::LongRangeRwd),
        Just(PowertrainCluster::Performance),
    ]
}

prop_compose! {
    fn record_strategy()(
        identity in (
            0u32..10_000,
            model_strategy(),
            prop::sample::select(vec![0.0, 200.0, 235.0, 280.0, 300.0, 366.0, 393.0]),
            prop::sample::select(vec![0.0, 57.5, 60.0, 67.0, 75.0, 79.0]),
            any::<bool>(),
            any::<bool>(),
        ),
        condition in (
            0u32..200_000,
            0i64..1_500,
            30i64..1_500,
            prop::bool::weighted(0.8),
            any::<bool>(),
        ),
        sale in (
            tires_strategy(),
            status_strategy(),
            prop_oneof![1 => Just(0.0), 1 => -5_000.0f64..0.0, 8 => 15_000.0f64..60_000.0],
        ),
    ) -> VehicleRecord {
        let (id, model, power_kw, battery_kwh, facelift, net) = identity;
        let (mileage_km, registration_offset, age_at_sale, accident_free, trailer_hitch) = condition;
        let (tires, status, winning_bid) = sale;
        let registration_date = epoch() + Duration::days(registration_offset);
        VehicleRecord {
            auction_id: format!("auction-{id:05}"),
            model,
            power_kw,
            battery_kwh,
            facelift,
            tax_regime: TaxRegime::from_net(net),
            mileage_km,
            registration_date,
            accident_free,
            trailer_hitch,
            tires,
            status,
            close_date: registration_date + Duration::days(age_at_sale),
            winning_bid,
        }
    }
}

prop_compose! {
    fn query_strategy()(
        model in model_strategy(),
        powertrain in cluster_strategy(),
        registration_offset in 0i64..1_500,
        age in 30i64..1_500,
        mileage_km in 0u32..200_000,
        wants_net_pricing in any::<bool>(),
        wants_trailer_hitch in any::<bool>(),
        wants_accident_free in any::<bool>(),
        tires in tires_strategy(),
        facelift in any::<bool>(),
    ) -> ValuationQuery {
        let registration_date = epoch() + Duration::days(registration_offset);
        ValuationQuery {
            model,
            powertrain,
            registration_date,
            mileage_km,
            wants_net_pricing,
            wants_trailer_hitch,
            wants_accident_free,
            tires,
            facelift,
            reference_date: registration_date + Duration::days(age),
        }
    }
}

prop_compose! {
    fn config_strategy()(
        neighbor_count in 1usize..12,
        weight_exponent in 0.5f64..5.0,
        recency in 0.0f64..1.0,
    ) -> ScoringConfiguration {
        let mut config = ScoringConfiguration::default();
        config.shared.neighbor_count = neighbor_count;
        config.shared.weight_exponent = weight_exponent;
        config.shared.recency_penalty_per_day = recency;
        config
    }
}

/// Ensures most generated cases have a non-empty cohort by cloning the query's
/// hard attributes onto a few records.
fn seed_matches(query: &ValuationQuery, records: &mut [VehicleRecord]) {
    let (power_kw, battery_kwh) = match (query.model, query.powertrain) {
        (_, PowertrainCluster::StandardRange) => (200.0, 57.5),
        (VehicleModel::Model3, PowertrainCluster::LongRange) => (300.0, 75.0),
        (VehicleModel::ModelY, PowertrainCluster::LongRange) => (366.0, 75.0),
        (_, PowertrainCluster::Performance) => (393.0, 79.0),
        (_, PowertrainCluster::LongRangeRwd) => (235.0, 75.0),
        (_, PowertrainCluster::Unknown) => (280.0, 67.0),
    };
    for record in records.iter_mut().step_by(2) {
        record.model = query.model;
        record.power_kw = power_kw;
        record.battery_kwh = battery_kwh;
        record.tax_regime = TaxRegime::from_net(query.wants_net_pricing);
        record.facelift = query.facelift;
    }
}

/// The Model 3 RWD long-range band only exists on the facelift generation.
fn effective_query(mut query: ValuationQuery) -> ValuationQuery {
    if query.model == VehicleModel::Model3 && query.powertrain == PowertrainCluster::LongRangeRwd {
        query.facelift = true;
    }
    query
}

fn fixture() -> impl Strategy<Value = (ValuationQuery, Vec<VehicleRecord>, ScoringConfiguration)> {
    (
        query_strategy(),
        prop::collection::vec(record_strategy(), 0..40),
        config_strategy(),
    )
        .prop_map(|(query, mut records, config)| {
            let query = effective_query(query);
            seed_matches(&query, &mut records);
            (query, records, config)
        })
}

fn neighbor_ids(valuation: &Valuation<'_>) -> Vec<String> {
    valuation
        .neighbors
        .iter()
        .map(|n| n.record.auction_id.clone())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        .. ProptestConfig::default()
    })]

    #[test]
    fn prediction_is_deterministic((query, records, config) in fixture()) {
        let first = predict_price(&query, &records, &config).expect("valid query");
        let second = predict_price(&query, &records, &config).expect("valid query");
        prop_assert_eq!(first.estimated_price.to_bits(), second.estimated_price.to_bits());
        prop_assert_eq!(neighbor_ids(&first), neighbor_ids(&second));
    }

    #[test]
    fn scores_are_non_negative_and_match_breakdown((query, records, config) in fixture()) {
        let valuation = predict_price(&query, &records, &config).expect("valid query");
        for candidate in valuation.neighbors.iter().chain(valuation.outliers.iter()) {
            prop_assert!(candidate.score >= 0.0);
            let sum: f64 = candidate.penalties.values().sum();
            prop_assert!((candidate.score - sum).abs() <= 1e-9 * (1.0 + candidate.score));
            prop_assert!(candidate.penalties.values().all(|points| *points >= 0.0));
        }
    }

    #[test]
    fn weights_decrease_with_score((query, records, config) in fixture()) {
        let valuation = predict_price(&query, &records, &config).expect("valid query");
        for a in &valuation.neighbors {
            for b in &valuation.neighbors {
                let (wa, wb) = (a.weight.expect("weight set"), b.weight.expect("weight set"));
                if b.score - a.score > 1e-9 * (1.0 + b.score) {
                    prop_assert!(wa > wb, "score {} < {} but weight {} <= {}", a.score, b.score, wa, wb);
                }
            }
        }
    }

    #[test]
    fn influence_sums_to_one((query, records, config) in fixture()) {
        let valuation = predict_price(&query, &records, &config).expect("valid query");
        if !valuation.neighbors.is_empty() {
            let total: f64 = valuation.neighbors.iter().filter_map(|n| n.influence).sum();
            prop_assert!((total - 1.0).abs() < 1e-9, "influence total {}", total);
        } else {
            prop_assert_eq!(valuation.estimated_price, 0.0);
        }
        prop_assert!(valuation.neighbors.len() <= config.shared.neighbor_count);
    }

    #[test]
    fn neighbors_respect_the_cohort((query, records, config) in fixture()) {
        let valuation = predict_price(&query, &records, &config).expect("valid query");
        for neighbor in &valuation.neighbors {
            let record = neighbor.record;
            prop_assert_eq!(record.model, query.model);
            prop_assert_eq!(
                classify(record.model, record.power_kw, record.battery_kwh, record.facelift),
                Some(query.powertrain)
            );
            prop_assert_eq!(record.facelift, query.facelift);
            prop_assert_eq!(record.tax_regime.is_net(), query.wants_net_pricing);
            prop_assert!(record.winning_bid > 0.0);
        }
    }

    #[test]
    fn backtest_never_uses_future_sales((query, records, config) in fixture()) {
        let excluded = records.first().map(|r| r.auction_id.clone());
        let options = CohortOptions {
            leakage_guard: true,
            exclude_auction_id: excluded.as_deref(),
        };
        let valuation = predict_price_with(&query, &records, &config, &options)
            .expect("valid query");
        for neighbor in valuation.neighbors.iter().chain(valuation.outliers.iter()) {
            prop_assert!(neighbor.record.close_date <= query.reference_date);
            prop_assert_ne!(Some(&neighbor.record.auction_id), excluded.as_ref());
        }
    }
}
