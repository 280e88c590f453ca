use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::error::{ValuationError, ValuationResult};
use crate::services::valuation::{
    SaleStatus, TaxRegime, TireConfiguration, VehicleModel, VehicleRecord,
};
use crate::time::parse_date_prefix;

const SKIP_MISSING_ID: &str = "missing_auction_id";
const SKIP_DUPLICATE_ID: &str = "duplicate_auction_id";
const SKIP_UNSUPPORTED_MODEL: &str = "unsupported_model";
const SKIP_REGISTRATION_DATE: &str = "invalid_registration_date";
const SKIP_CLOSE_DATE: &str = "invalid_close_date";
const SKIP_MILEAGE: &str = "invalid_mileage";

/// Model 3 registrations from this date on are the facelift generation when
/// the source row carries no explicit flag.
fn facelift_cutoff() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2023, 10, 1)
}

/// One auction row as exported by the marketplace. Every field is optional and
/// loosely typed; `into_record` decides what is usable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAuctionRow {
    #[serde(default)]
    pub auction_id: Value,
    #[serde(default)]
    pub model: Value,
    #[serde(default)]
    pub powe_kw: Value,
    #[serde(default)]
    pub battery_netto: Value,
    #[serde(default)]
    pub is_highland: Value,
    #[serde(default)]
    pub taxation: Value,
    #[serde(default)]
    pub mileage: Value,
    #[serde(default)]
    pub first_registration: Value,
    #[serde(default)]
    pub accident_free_cardentity: Value,
    #[serde(default)]
    pub features_trailer_hitch: Value,
    #[serde(default)]
    pub trailer_hitch_seller: Value,
    #[serde(default)]
    pub tires_total_sets: Value,
    #[serde(default)]
    pub tires_summer: Value,
    #[serde(default)]
    pub tires_winter: Value,
    #[serde(default)]
    pub tires_all_season: Value,
    #[serde(default)]
    pub status: Value,
    #[serde(default)]
    pub auction_end_date: Value,
    #[serde(default)]
    pub highest_bid_price: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded: usize,
    /// Skipped row count per reason.
    pub skipped: BTreeMap<String, usize>,
}

impl LoadReport {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    fn skip(&mut self, reason: &str) {
        *self.skipped.entry(reason.to_string()).or_insert(0) += 1;
    }
}

fn value_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn value_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "t" | "true" | "1" | "yes" | "y"
        ),
        _ => false,
    }
}

fn value_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_prefix(s),
        _ => None,
    }
}

fn parse_model(value: &Value) -> Option<VehicleModel> {
    value_str(value).and_then(|raw| raw.parse().ok())
}

fn parse_tax_regime(value: &Value) -> TaxRegime {
    match value_str(value).as_deref() {
        Some("vat_deductible") => TaxRegime::VatDeductible,
        _ => TaxRegime::MarginTaxed,
    }
}

impl RawAuctionRow {
    /// Maps the row onto a record, or names the reason it cannot be used.
    pub fn into_record(self) -> Result<VehicleRecord, &'static str> {
        let auction_id = value_str(&self.auction_id).ok_or(SKIP_MISSING_ID)?;
        let model = parse_model(&self.model).ok_or(SKIP_UNSUPPORTED_MODEL)?;
        let registration_date =
            value_date(&self.first_registration).ok_or(SKIP_REGISTRATION_DATE)?;
        let close_date = value_date(&self.auction_end_date).ok_or(SKIP_CLOSE_DATE)?;
        let mileage_km = value_f64(&self.mileage)
            .filter(|km| *km >= 0.0 && *km <= f64::from(u32::MAX))
            .map(|km| km.round() as u32)
            .ok_or(SKIP_MILEAGE)?;

        let facelift = if self.is_highland.is_null() {
            model == VehicleModel::Model3
                && facelift_cutoff().is_some_and(|cutoff| registration_date >= cutoff)
        } else {
            value_flag(&self.is_highland)
        };

        let total_sets = value_f64(&self.tires_total_sets)
            .map(|sets| sets.max(0.0).round() as u32)
            .unwrap_or(0);
        let tires = TireConfiguration::from_sets(
            total_sets,
            value_flag(&self.tires_winter),
            value_flag(&self.tires_all_season),
        );

        Ok(VehicleRecord {
            auction_id,
            model,
            power_kw: value_f64(&self.powe_kw).unwrap_or(0.0),
            battery_kwh: value_f64(&self.battery_netto).unwrap_or(0.0),
            facelift,
            tax_regime: parse_tax_regime(&self.taxation),
            mileage_km,
            registration_date,
            accident_free: value_flag(&self.accident_free_cardentity),
            trailer_hitch: value_flag(&self.features_trailer_hitch)
                || value_flag(&self.trailer_hitch_seller),
            tires,
            status: value_str(&self.status)
                .map(|raw| SaleStatus::from_source(&raw))
                .unwrap_or(SaleStatus::Other),
            close_date,
            winning_bid: value_f64(&self.highest_bid_price).unwrap_or(0.0),
        })
    }
}

/// Parses a JSON array of raw auction rows. Unusable rows are counted in the
/// report, never loaded; the first row wins on duplicate ids.
pub fn parse_records(json: &str) -> ValuationResult<(Vec<VehicleRecord>, LoadReport)> {
    let rows: Vec<RawAuctionRow> = serde_json::from_str(json)
        .map_err(|err| ValuationError::dataset(format!("expected a JSON array of rows: {err}")))?;
    Ok(collect_records(rows))
}

/// Same as [`parse_records`] for a headed CSV export. Empty cells count as missing.
pub fn parse_csv_records(csv_text: &str) -> ValuationResult<(Vec<VehicleRecord>, LoadReport)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());
    let mut rows = Vec::new();
    for (index, cells) in reader.deserialize::<HashMap<String, String>>().enumerate() {
        let cells = cells.map_err(|err| {
            ValuationError::dataset(format!("csv row {}: {err}", index + 1))
        })?;
        let object: serde_json::Map<String, Value> = cells
            .into_iter()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(column, cell)| (column, Value::String(cell)))
            .collect();
        let row: RawAuctionRow = serde_json::from_value(Value::Object(object))
            .map_err(|err| ValuationError::dataset(format!("csv row {}: {err}", index + 1)))?;
        rows.push(row);
    }
    Ok(collect_records(rows))
}

fn collect_records(rows: Vec<RawAuctionRow>) -> (Vec<VehicleRecord>, LoadReport) {
    let mut report = LoadReport {
        total_rows: rows.len(),
        ..LoadReport::default()
    };
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        match row.into_record() {
            Ok(record) if !seen.insert(record.auction_id.clone()) => {
                tracing::debug!(index, auction_id = %record.auction_id, "duplicate auction id");
                report.skip(SKIP_DUPLICATE_ID);
            }
            Ok(record) => records.push(record),
            Err(reason) => {
                tracing::debug!(index, reason, "skipping auction row");
                report.skip(reason);
            }
        }
    }
    report.loaded = records.len();

    if report.skipped_total() > 0 {
        tracing::warn!(
            skipped = report.skipped_total(),
            reasons = ?report.skipped,
            "skipped unusable auction rows"
        );
    }
    (records, report)
}

/// Loads a `.csv` export or a JSON array (any other extension).
pub fn load_dataset(path: &Path) -> Result<(Vec<VehicleRecord>, LoadReport)> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset {}", path.display()))?;
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let parsed = if is_csv {
        parse_csv_records(&raw)
    } else {
        parse_records(&raw)
    };
    let (records, report) = parsed.with_context(|| format!("failed to load {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        loaded = report.loaded,
        total = report.total_rows,
        "dataset loaded"
    );
    Ok((records, report))
}
