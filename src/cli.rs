use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::load_scoring_config;
use crate::dataset::{load_dataset, LoadReport};
use crate::presets::Preset;
use crate::services::calibration::{evaluate, EvaluationSummary};
use crate::services::valuation::{
    predict_price_with, CohortOptions, PowertrainId, ScoringConfiguration, TireConfiguration, Valuation,
    ValuationQuery, VehicleRecord,
};
use crate::time::today_utc;

#[derive(Parser)]
#[command(
    name = "ev-valuation",
    version,
    about = "Comparable-sales valuation for used Model 3 / Model Y"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Estimate a price from comparable auctions.
    Predict(PredictArgs),
    /// Leave-one-out backtest of a scoring configuration.
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ScoringArgs {
    /// JSON scoring configuration (overrides VALUATION_SCORING_CONFIG_PATH and --preset).
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Preset::Production)]
    pub preset: Preset,
}

impl ScoringArgs {
    pub fn load(&self) -> Result<ScoringConfiguration> {
        load_scoring_config(self.config.as_deref(), self.preset)
    }
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Auction rows: JSON array, or a headed `.csv` export.
    #[arg(long)]
    pub dataset: PathBuf,
    /// Model-prefixed cluster id: m3_sr, m3_lr, m3_lr_rwd, m3_p, my_sr, my_lr, my_lr_rwd, my_p.
    #[arg(long)]
    pub powertrain: PowertrainId,
    /// First registration (YYYY-MM-DD).
    #[arg(long)]
    pub registration: NaiveDate,
    #[arg(long)]
    pub mileage: u32,
    /// Price net of VAT (VAT-deductible cohort).
    #[arg(long, default_value_t = false)]
    pub net: bool,
    #[arg(long, default_value_t = false)]
    pub hitch: bool,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub accident_free: bool,
    /// 8_tires, 4_summer, 4_winter or 4_all_season.
    #[arg(long, default_value = "4_summer")]
    pub tires: TireConfiguration,
    /// Facelift generation (Model 3 "Highland").
    #[arg(long, default_value_t = false)]
    pub facelift: bool,
    /// Valuation date. Default: today (UTC). A past date also hides sales
    /// that closed after it.
    #[arg(long)]
    pub reference_date: Option<NaiveDate>,
    #[command(flatten)]
    pub scoring: ScoringArgs,
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl PredictArgs {
    pub fn to_query(&self) -> ValuationQuery {
        ValuationQuery {
            model: self.powertrain.model,
            powertrain: self.powertrain.cluster,
            registration_date: self.registration,
            mileage_km: self.mileage,
            wants_net_pricing: self.net,
            wants_trailer_hitch: self.hitch,
            wants_accident_free: self.accident_free,
            tires: self.tires,
            facelift: self.facelift,
            reference_date: self.reference_date.unwrap_or_else(today_utc),
        }
    }

    /// An explicit `--reference-date` values the car as of that day, so later
    /// sales must not feed the estimate.
    pub fn cohort_options(&self) -> CohortOptions<'static> {
        CohortOptions {
            leakage_guard: self.reference_date.is_some(),
            exclude_auction_id: None,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub dataset: PathBuf,
    #[command(flatten)]
    pub scoring: ScoringArgs,
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_records(path: &Path) -> Result<(Vec<VehicleRecord>, LoadReport)> {
    let (records, report) = load_dataset(path)?;
    anyhow::ensure!(
        !records.is_empty(),
        "dataset {} has no usable rows ({} skipped)",
        path.display(),
        report.skipped_total()
    );
    Ok((records, report))
}

#[derive(Serialize)]
struct PredictReport<'a> {
    query: &'a ValuationQuery,
    powertrain: String,
    valuation: &'a Valuation<'a>,
}

pub fn predict(args: PredictArgs) -> Result<()> {
    let config = args.scoring.load()?;
    let (records, _) = load_records(&args.dataset)?;
    let query = args.to_query();
    let valuation = predict_price_with(&query, &records, &config, &args.cohort_options())
        .with_context(|| format!("valuation failed for {}", query.powertrain_id()))?;

    if args.json {
        let report = PredictReport {
            query: &query,
            powertrain: query.powertrain_id().to_string(),
            valuation: &valuation,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_valuation(&query, &valuation));
    }
    Ok(())
}

pub fn evaluate_command(args: EvaluateArgs) -> Result<()> {
    let config = args.scoring.load()?;
    let (records, report) = load_records(&args.dataset)?;
    let summary = evaluate(&config, &records).context("evaluation failed")?;
    tracing::info!(
        loaded = report.loaded,
        evaluated = summary.evaluated_count,
        median = ?summary.median_error_pct,
        "evaluation complete"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_summary(&summary));
    }
    Ok(())
}

fn fmt_pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}%"))
        .unwrap_or_else(|| "—".to_string())
}

pub fn render_valuation(query: &ValuationQuery, valuation: &Valuation<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} km, registered {}, valued {}",
        query.powertrain_id(),
        query.mileage_km,
        query.registration_date,
        query.reference_date
    );
    if !valuation.has_prediction() {
        let _ = writeln!(
            out,
            "insufficient data: {} comparable(s) in cohort",
            valuation.cohort_size
        );
        return out;
    }
    let _ = writeln!(
        out,
        "estimated price: {:.0} (cohort {}, neighbors {}, outliers {})",
        valuation.estimated_price,
        valuation.cohort_size,
        valuation.neighbors.len(),
        valuation.outliers.len()
    );
    for neighbor in &valuation.neighbors {
        let penalties = neighbor
            .penalties
            .iter()
            .filter(|(_, points)| **points > 0.0)
            .map(|(factor, points)| format!("{factor}={points:.1}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            out,
            "  {:<12} score {:>7.1}  influence {:>5.1}%  price {:>7.0} -> {:>7.0}  [{}]",
            neighbor.record.auction_id,
            neighbor.score,
            neighbor.influence.unwrap_or(0.0) * 100.0,
            neighbor.original_price,
            neighbor.adjusted_price,
            penalties
        );
    }
    for outlier in &valuation.outliers {
        let _ = writeln!(
            out,
            "  outlier {}: {}",
            outlier.record.auction_id,
            outlier.outlier_reason.as_deref().unwrap_or("rejected")
        );
    }
    out
}

pub fn render_summary(summary: &EvaluationSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "median {}  mean {}  p90 {}",
        fmt_pct(summary.median_error_pct),
        fmt_pct(summary.mean_error_pct),
        fmt_pct(summary.p90_error_pct)
    );
    let _ = writeln!(
        out,
        "evaluated {}  skipped {} (ineligible {}, no prediction {})",
        summary.evaluated_count,
        summary.skipped_count,
        summary.skipped_ineligible,
        summary.skipped_no_prediction
    );
    for (model, median) in &summary.per_model_median_pct {
        let _ = writeln!(out, "  {model}: median {median:.2}%");
    }
    out
}
