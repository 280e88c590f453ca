use serde::{Deserialize, Serialize};

use super::types::VehicleModel;

// Band edges are fitted to the auction history, not physical constants.
// Re-run the calibration harness before moving any of them.
/// Batteries below this are standard-range packs.
const SMALL_PACK_MAX_KWH: f64 = 65.0;
/// Batteries at or above this are long-range / performance packs.
const LARGE_PACK_MIN_KWH: f64 = 70.0;
/// Standard-range and RWD long-range drives sit below this.
const SINGLE_MOTOR_MAX_KW: f64 = 250.0;
const MODEL_3_LONG_RANGE_MIN_KW: f64 = 250.0;
const MODEL_3_PERFORMANCE_MIN_KW: f64 = 350.0;
const MODEL_Y_LONG_RANGE_MIN_KW: f64 = 300.0;
const MODEL_Y_PERFORMANCE_MIN_KW: f64 = 390.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PowertrainCluster {
    StandardRange,
    LongRange,
    LongRangeRwd,
    Performance,
    /// Specs outside every band. Never matches a query.
    Unknown,
}

impl PowertrainCluster {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::StandardRange => "sr",
            Self::LongRange => "lr",
            Self::LongRangeRwd => "lr_rwd",
            Self::Performance => "p",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "sr" => Some(Self::StandardRange),
            "lr" => Some(Self::LongRange),
            "lr_rwd" => Some(Self::LongRangeRwd),
            "p" => Some(Self::Performance),
            _ => None,
        }
    }

    pub fn id(self, model: VehicleModel) -> String {
        match self {
            Self::Unknown => "unknown".to_string(),
            known => format!("{}_{}", model.id_prefix(), known.suffix()),
        }
    }
}

/// Maps raw power/battery specs onto a cluster.
///
/// Returns `None` when either spec is missing (zero or non-finite) and
/// `Some(Unknown)` when the specs fall outside every band. Bands are checked from
/// the highest power threshold down so performance is never shadowed by long range.
pub fn classify(
    model: VehicleModel,
    power_kw: f64,
    battery_kwh: f64,
    facelift: bool,
) -> Option<PowertrainCluster> {
    if !(power_kw.is_finite() && power_kw > 0.0 && battery_kwh.is_finite() && battery_kwh > 0.0) {
        return None;
    }

    if battery_kwh < SMALL_PACK_MAX_KWH {
        return Some(if power_kw < SINGLE_MOTOR_MAX_KW {
            PowertrainCluster::StandardRange
        } else {
            PowertrainCluster::Unknown
        });
    }
    if battery_kwh < LARGE_PACK_MIN_KWH {
        return Some(PowertrainCluster::Unknown);
    }

    let cluster = match model {
        VehicleModel::Model3 => {
            if power_kw >= MODEL_3_PERFORMANCE_MIN_KW {
                PowertrainCluster::Performance
            } else if power_kw >= MODEL_3_LONG_RANGE_MIN_KW {
                PowertrainCluster::LongRange
            } else if facelift {
                // Only the facelift generation ships a single-motor long-range Model 3.
                PowertrainCluster::LongRangeRwd
            } else {
                PowertrainCluster::Unknown
            }
        }
        VehicleModel::ModelY => {
            if power_kw >= MODEL_Y_PERFORMANCE_MIN_KW {
                PowertrainCluster::Performance
            } else if power_kw >= MODEL_Y_LONG_RANGE_MIN_KW {
                PowertrainCluster::LongRange
            } else if power_kw < SINGLE_MOTOR_MAX_KW {
                PowertrainCluster::LongRangeRwd
            } else {
                PowertrainCluster::Unknown
            }
        }
    };
    Some(cluster)
}
