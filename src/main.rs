use anyhow::Result;
use clap::Parser;
use ev_valuation::cli::{self, Cli, Commands};

fn main() -> Result<()> {
    cli::init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Predict(args) => cli::predict(args),
        Commands::Evaluate(args) => cli::evaluate_command(args),
    }
}
