//! Command-line parsing for the lag alignment tool.
//!
//! Argument parsing and command dispatch stay separate from the solver and
//! refinement code.

use clap::{Args, Parser, Subcommand};

use crate::domain::DEFAULT_MIN_STD;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "lagalign", version, about = "Pairwise lag alignment with peak refinement")]
pub struct Cli {
    /// Verbose logging (DEBUG level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Solve once from the rank-1 candidates and compare with the truth.
    Solve(RunArgs),
    /// Alternate refinement and re-solving until no pair changes.
    Refine(RunArgs),
    /// Solve once and report which pairs a refinement pass would change.
    Diagnose(RunArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Number of items (signals) to align.
    #[arg(short = 'n', long, default_value_t = 8)]
    pub items: usize,

    /// Candidate measurements per pair.
    #[arg(short = 'p', long, default_value_t = 3)]
    pub candidates: usize,

    /// Random seed for problem generation.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Standard deviation of timing noise on the true candidate.
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    /// Spacing of cycle-skipped distractor lags.
    #[arg(long, default_value_t = 1.0)]
    pub period: f64,

    /// Probability that rank 1 of a pair holds a distractor.
    #[arg(long, default_value_t = 0.2)]
    pub outlier_prob: f64,

    /// Probability that a distractor has the wrong polarity.
    #[arg(long, default_value_t = 0.5)]
    pub flip_prob: f64,

    /// Store candidates as N×N grids instead of compact pair sequences.
    #[arg(long)]
    pub grid: bool,

    /// Misfit floor in standard deviations.
    #[arg(long, default_value_t = DEFAULT_MIN_STD)]
    pub min_std: f64,

    /// Allow candidates whose polarity disagrees with the target.
    #[arg(long)]
    pub no_force_polarity: bool,

    /// Maximum refine/re-solve passes.
    #[arg(long, default_value_t = 10)]
    pub iterations: usize,

    /// Independent problems to run in parallel, seeds `seed..seed+trials`.
    #[arg(long, default_value_t = 1)]
    pub trials: usize,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}
