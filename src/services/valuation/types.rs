use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::powertrain::{self, PowertrainCluster};
use crate::error::{ValuationError, ValuationResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum VehicleModel {
    Model3,
    ModelY,
}

impl VehicleModel {
    pub const ALL: [VehicleModel; 2] = [VehicleModel::Model3, VehicleModel::ModelY];

    pub fn label(self) -> &'static str {
        match self {
            Self::Model3 => "Model 3",
            Self::ModelY => "Model Y",
        }
    }

    /// Prefix used in powertrain ids (`m3_lr`, `my_p`).
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Model3 => "m3",
            Self::ModelY => "my",
        }
    }
}

impl fmt::Display for VehicleModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for VehicleModel {
    type Err = ValuationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "model3" | "m3" => Ok(Self::Model3),
            "modely" | "my" => Ok(Self::ModelY),
            _ => Err(ValuationError::invalid_query(format!(
                "unsupported vehicle model: {s}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaxRegime {
    VatDeductible,
    MarginTaxed,
}

impl TaxRegime {
    /// Net (VAT-deductible) pricing; the boolean the cohort filter matches on.
    pub fn is_net(self) -> bool {
        matches!(self, Self::VatDeductible)
    }

    pub fn from_net(net: bool) -> Self {
        if net {
            Self::VatDeductible
        } else {
            Self::MarginTaxed
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Accepted,
    Declined,
    Other,
}

impl SaleStatus {
    pub fn from_source(raw: &str) -> Self {
        match raw.trim() {
            "closed_seller_accepted" => Self::Accepted,
            "closed_seller_declined" => Self::Declined,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TireConfiguration {
    EightTires,
    FourSummer,
    FourWinter,
    FourAllSeason,
}

impl TireConfiguration {
    /// Two sets means eight tires regardless of category; a single set is
    /// all-season over winter over summer (the default).
    pub fn from_sets(total_sets: u32, winter: bool, all_season: bool) -> Self {
        if total_sets >= 2 {
            Self::EightTires
        } else if all_season {
            Self::FourAllSeason
        } else if winter {
            Self::FourWinter
        } else {
            Self::FourSummer
        }
    }

    pub fn is_eight(self) -> bool {
        matches!(self, Self::EightTires)
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::EightTires => "8_tires",
            Self::FourSummer => "4_summer",
            Self::FourWinter => "4_winter",
            Self::FourAllSeason => "4_all_season",
        }
    }
}

impl fmt::Display for TireConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TireConfiguration {
    type Err = ValuationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "8" | "8_tires" | "eight" | "eight_tires" => Ok(Self::EightTires),
            "4_summer" | "summer" => Ok(Self::FourSummer),
            "4_winter" | "winter" => Ok(Self::FourWinter),
            "4_all_season" | "all_season" | "allseason" => Ok(Self::FourAllSeason),
            _ => Err(ValuationError::invalid_query(format!(
                "unsupported tire configuration: {s}"
            ))),
        }
    }
}

/// One completed auction. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleRecord {
    pub auction_id: String,
    pub model: VehicleModel,
    /// Rated power in kW; 0 when the source row had none.
    pub power_kw: f64,
    /// Usable battery capacity in kWh; 0 when the source row had none.
    pub battery_kwh: f64,
    pub facelift: bool,
    pub tax_regime: TaxRegime,
    pub mileage_km: u32,
    pub registration_date: NaiveDate,
    pub accident_free: bool,
    pub trailer_hitch: bool,
    pub tires: TireConfiguration,
    pub status: SaleStatus,
    pub close_date: NaiveDate,
    /// Winning bid; `<= 0` marks the record unusable as a comparable.
    pub winning_bid: f64,
}

impl VehicleRecord {
    pub fn powertrain(&self) -> Option<PowertrainCluster> {
        powertrain::classify(self.model, self.power_kw, self.battery_kwh, self.facelift)
    }

    pub fn has_valid_bid(&self) -> bool {
        self.winning_bid.is_finite() && self.winning_bid > 0.0
    }
}

/// Model plus cluster, written `m3_lr` / `my_p` at the edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PowertrainId {
    pub model: VehicleModel,
    pub cluster: PowertrainCluster,
}

impl fmt::Display for PowertrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cluster.id(self.model))
    }
}

impl FromStr for PowertrainId {
    type Err = ValuationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        let (prefix, suffix) = trimmed.split_once('_').ok_or_else(|| {
            ValuationError::unknown_powertrain(format!("expected <model>_<cluster>, got {s}"))
        })?;
        let model = VehicleModel::from_str(prefix)?;
        let cluster = PowertrainCluster::from_suffix(suffix)
            .ok_or_else(|| ValuationError::unknown_powertrain(s.trim().to_string()))?;
        Ok(Self { model, cluster })
    }
}

/// A single valuation request. `reference_date` is "now" for the request:
/// production passes today, backtests pass the target auction's close date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValuationQuery {
    pub model: VehicleModel,
    pub powertrain: PowertrainCluster,
    pub registration_date: NaiveDate,
    pub mileage_km: u32,
    pub wants_net_pricing: bool,
    pub wants_trailer_hitch: bool,
    pub wants_accident_free: bool,
    pub tires: TireConfiguration,
    pub facelift: bool,
    pub reference_date: NaiveDate,
}

impl ValuationQuery {
    /// Mirrors a historical record for leave-one-out evaluation. `None` when the
    /// record's powertrain is missing or unclassifiable.
    pub fn from_record(record: &VehicleRecord, reference_date: NaiveDate) -> Option<Self> {
        let powertrain = record.powertrain()?;
        if powertrain == PowertrainCluster::Unknown {
            return None;
        }
        Some(Self {
            model: record.model,
            powertrain,
            registration_date: record.registration_date,
            mileage_km: record.mileage_km,
            wants_net_pricing: record.tax_regime.is_net(),
            wants_trailer_hitch: record.trailer_hitch,
            wants_accident_free: record.accident_free,
            tires: record.tires,
            facelift: record.facelift,
            reference_date,
        })
    }

    pub fn powertrain_id(&self) -> PowertrainId {
        PowertrainId {
            model: self.model,
            cluster: self.powertrain,
        }
    }

    pub fn validate(&self) -> ValuationResult<()> {
        if self.powertrain == PowertrainCluster::Unknown {
            return Err(ValuationError::unknown_powertrain(format!(
                "{} query must name a known powertrain cluster",
                self.model
            )));
        }
        if self.registration_date > self.reference_date {
            return Err(ValuationError::invalid_query(format!(
                "registration date {} is after the reference date {}",
                self.registration_date, self.reference_date
            )));
        }
        Ok(())
    }
}

/// A cohort member after scoring and price normalization.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredComparable<'a> {
    pub record: &'a VehicleRecord,
    pub score: f64,
    /// Points per factor; sums to `score`.
    pub penalties: BTreeMap<&'static str, f64>,
    pub original_price: f64,
    pub adjusted_price: f64,
    /// Currency adjustments applied on top of `original_price`.
    pub adjustments: BTreeMap<&'static str, f64>,
    pub weight: Option<f64>,
    pub influence: Option<f64>,
    pub outlier_reason: Option<String>,
}

/// Pipeline output. `estimated_price == 0.0` with no neighbors means
/// "insufficient data".
#[derive(Debug, Clone, Serialize)]
pub struct Valuation<'a> {
    pub estimated_price: f64,
    pub neighbors: Vec<ScoredComparable<'a>>,
    pub outliers: Vec<ScoredComparable<'a>>,
    pub cohort_size: usize,
    pub consensus_median: Option<f64>,
}

impl<'a> Valuation<'a> {
    pub fn empty(cohort_size: usize) -> Self {
        Self {
            estimated_price: 0.0,
            neighbors: Vec::new(),
            outliers: Vec::new(),
            cohort_size,
            consensus_median: None,
        }
    }

    pub fn has_prediction(&self) -> bool {
        self.estimated_price > 0.0 && !self.neighbors.is_empty()
    }
}
