//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs the log subscriber
//! - runs the alignment pipeline (once, or as a batch of trials)
//! - prints the report (text or JSON)

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, RunArgs};
use crate::domain::{AlignConfig, RunMode};
use crate::error::AlignError;

pub mod pipeline;

/// Entry point for the `lagalign` binary.
pub fn run() -> Result<(), AlignError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.command {
        Command::Solve(args) => align_config_from_args(args, RunMode::Solve),
        Command::Refine(args) => align_config_from_args(args, RunMode::Refine),
        Command::Diagnose(args) => align_config_from_args(args, RunMode::Diagnose),
    };
    config.validate()?;

    if config.trials > 1 {
        let trials = pipeline::run_trials(&config)?;
        if config.json {
            let summaries: Vec<_> = trials
                .iter()
                .map(|t| crate::report::RunSummary::new(&t.run, &t.config))
                .collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        } else {
            println!("{}", crate::report::format_trials(&trials, &config));
        }
        return Ok(());
    }

    let run = pipeline::run_alignment(&config)?;

    if config.json {
        let summary = crate::report::RunSummary::new(&run, &config);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", crate::report::format_run_summary(&run, &config));
    }

    Ok(())
}

pub fn align_config_from_args(args: &RunArgs, mode: RunMode) -> AlignConfig {
    AlignConfig {
        mode,
        items: args.items,
        candidates: args.candidates,
        seed: args.seed,
        noise: args.noise,
        period: args.period,
        outlier_prob: args.outlier_prob,
        flip_prob: args.flip_prob,
        grid: args.grid,
        min_std: args.min_std,
        force_polarity: !args.no_force_polarity,
        iterations: args.iterations,
        trials: args.trials,
        json: args.json,
    }
}

/// `RUST_LOG` wins when set; otherwise `-v` picks DEBUG over WARN.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
