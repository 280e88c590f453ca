use anyhow::{Context, Result};
use clap::Parser;
use ev_valuation::cli::{init_tracing, render_summary};
use ev_valuation::config::load_baseline_config;
use ev_valuation::dataset::load_dataset;
use ev_valuation::presets::Preset;
use ev_valuation::services::calibration::{random_search, SearchOptions, SearchSpace};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Parser)]
#[command(about = "Randomized search over scoring parameters, scored by leave-one-out median error.")]
struct Args {
    /// Auction rows: JSON array, or a headed `.csv` export.
    #[arg(long)]
    dataset: PathBuf,

    /// Number of sampled candidate configurations.
    #[arg(long, default_value_t = 2_000)]
    trials: usize,

    /// RNG seed for deterministic sampling.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Worker threads for leave-one-out evaluation (0 = rayon default).
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Configuration the search starts from and reports improvement against.
    #[arg(long, value_enum, default_value_t = Preset::UnifiedBaseline)]
    baseline_preset: Preset,

    /// Baseline configuration file; takes precedence over --baseline-preset.
    /// VALUATION_SCORING_CONFIG_PATH is not consulted here.
    #[arg(long)]
    baseline_config: Option<PathBuf>,

    /// Print the best configuration as JSON on stdout.
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

#[cfg(feature = "rayon")]
fn configure_threads(threads: usize) -> Result<()> {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure rayon thread pool")?;
    }
    Ok(())
}

#[cfg(not(feature = "rayon"))]
fn configure_threads(threads: usize) -> Result<()> {
    if threads > 1 {
        tracing::warn!(threads, "built without the rayon feature; running single-threaded");
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    configure_threads(args.threads)?;

    let baseline = load_baseline_config(args.baseline_config.as_deref(), args.baseline_preset)?;
    let baseline_source = match &args.baseline_config {
        Some(path) => path.display().to_string(),
        None => format!("{} preset", args.baseline_preset),
    };
    let (records, report) = load_dataset(&args.dataset)?;
    anyhow::ensure!(
        !records.is_empty(),
        "dataset {} has no usable rows",
        args.dataset.display()
    );

    let started = Instant::now();
    let outcome = random_search(
        &records,
        &baseline,
        &SearchSpace::default(),
        SearchOptions {
            trials: args.trials,
            seed: args.seed,
        },
    )
    .context("calibration search failed")?;
    let elapsed = started.elapsed();

    eprintln!(
        "calibration_search: {} records ({} skipped on load), {} trials ({} invalid) in {:.1}s, seed {}",
        report.loaded,
        report.skipped_total(),
        outcome.trials_run,
        outcome.trials_invalid,
        elapsed.as_secs_f64(),
        args.seed
    );
    eprintln!("baseline ({baseline_source}):");
    eprint!("{}", render_summary(&outcome.baseline));
    eprintln!("best:");
    eprint!("{}", render_summary(&outcome.best));
    match outcome.improvement_pct {
        Some(pct) => eprintln!("improvement over baseline: {pct:.2}%"),
        None => eprintln!("improvement over baseline: n/a"),
    }
    for step in &outcome.improvements {
        eprintln!("  trial {:>5}: median {:.2}%", step.trial, step.median_error_pct);
    }

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&outcome.best_config)?);
    }
    Ok(())
}
