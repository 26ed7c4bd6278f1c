//! Shared alignment pipeline used by every subcommand.
//!
//! Workflow:
//! synthetic problem -> solve (rank 0) -> estimate item state -> refine -> re-solve -> ...
//!
//! The loop stops when a pass makes no swaps or the iteration budget runs out.
//! Subcommands only differ in how far they go and what they print.
//!
//! Each run is sequential. Independent trials (one per seed) share nothing,
//! so `run_trials` fans them out across the rayon pool.

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::data::{SyntheticProblem, generate_problem};
use crate::domain::{AlignConfig, ItemState, RunMode};
use crate::error::AlignError;
use crate::refine::{CandidateSet, CandidateWeights, Diagnostics, diagnose_peaks, refine_peaks};
use crate::solver::{SolveOutput, solve_travel_times};

/// Normal-consistency factor for the median absolute deviation.
const MAD_SCALE: f64 = 1.4826;

/// Lower bound on the residual scale, so a noise-free fit still yields
/// non-zero uncertainties.
const SIGMA_FLOOR: f64 = 1e-9;

/// One solve/refine round.
#[derive(Debug, Clone, Serialize)]
pub struct IterationRecord {
    pub iteration: usize,
    /// Residual RMS of the solve the pass was scored against.
    pub rms_residual: f64,
    pub swapped_pairs: usize,
    /// Pairs whose rank-0 lag is the true one after the pass.
    pub correct_on_top: usize,
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct AlignmentRun {
    pub problem: SyntheticProblem,
    /// Candidate arrays after the last pass.
    pub candidates: CandidateSet,
    /// Final solve, consistent with `candidates`.
    pub solve: SolveOutput,
    pub state: ItemState,
    pub history: Vec<IterationRecord>,
    pub diagnostics: Option<Diagnostics>,
    pub converged: bool,
}

/// Execute the pipeline for `config.mode`.
pub fn run_alignment(config: &AlignConfig) -> Result<AlignmentRun, AlignError> {
    let problem = generate_problem(config)?;
    info!(
        items = config.items,
        candidates = config.candidates,
        grid = config.grid,
        "generated synthetic problem"
    );
    run_alignment_on(config, problem)
}

/// One run of a multi-trial batch.
#[derive(Debug, Clone)]
pub struct TrialRun {
    /// Config the trial ran with; `seed` differs per trial.
    pub config: AlignConfig,
    pub run: AlignmentRun,
}

impl TrialRun {
    /// Largest absolute difference between solution and truth.
    pub fn max_error(&self) -> f64 {
        self.run
            .solve
            .solution
            .iter()
            .zip(&self.run.problem.truth)
            .map(|(s, t)| (s - t).abs())
            .fold(0.0, f64::max)
    }
}

/// Run `config.trials` independent problems with seeds `seed, seed + 1, ...`.
///
/// Results come back in seed order; the first failing trial's error is
/// returned.
pub fn run_trials(config: &AlignConfig) -> Result<Vec<TrialRun>, AlignError> {
    let configs: Vec<AlignConfig> = (0..config.trials as u64)
        .map(|t| AlignConfig {
            seed: config.seed.wrapping_add(t),
            ..config.clone()
        })
        .collect();
    info!(trials = configs.len(), "running independent trials");

    configs
        .into_par_iter()
        .map(|config| -> Result<TrialRun, AlignError> {
            let run = run_alignment(&config)?;
            Ok(TrialRun { config, run })
        })
        .collect()
}

/// Execute the pipeline on an existing problem.
pub fn run_alignment_on(config: &AlignConfig, problem: SyntheticProblem) -> Result<AlignmentRun, AlignError> {
    let opts = config.refine_options();
    let weights = CandidateWeights::default();
    let mut candidates = problem.candidates.clone();
    let mut solve = solve_travel_times(candidates.lag(), None, None)?;
    let mut state = estimate_state(&solve, &problem.polarity)?;
    let mut history = Vec::new();
    let mut diagnostics = None;
    let mut converged = false;

    match config.mode {
        RunMode::Solve => {}
        RunMode::Diagnose => {
            diagnostics = Some(diagnose_peaks(&candidates, &state, &weights, &opts)?);
        }
        RunMode::Refine => {
            for iteration in 1..=config.iterations {
                let rms_residual = solve.rms_residual();
                let outcome = refine_peaks(&mut candidates, &state, &weights, &opts)?;
                let swapped_pairs = outcome.pair_changes(candidates.is_grid());
                history.push(IterationRecord {
                    iteration,
                    rms_residual,
                    swapped_pairs,
                    correct_on_top: problem.correct_on_top(&candidates, config.period),
                });
                info!(iteration, swapped_pairs, rms_residual, "refinement pass");

                if swapped_pairs == 0 {
                    converged = true;
                    break;
                }
                solve = solve_travel_times(candidates.lag(), None, None)?;
                state = estimate_state(&solve, &problem.polarity)?;
            }
        }
    }

    Ok(AlignmentRun {
        problem,
        candidates,
        solve,
        state,
        history,
        diagnostics,
        converged,
    })
}

/// Item state for refinement from a solve.
///
/// Uncertainty is the propagated covariance scaled by a robust residual
/// scale (MAD), so a handful of cycle-skipped pairs do not inflate it.
pub fn estimate_state(solve: &SolveOutput, polarity: &[i8]) -> Result<ItemState, AlignError> {
    let mut abs: Vec<f64> = solve.residuals().iter().map(|r| r.abs()).collect();
    abs.sort_by(|a, b| a.total_cmp(b));
    let sigma = (MAD_SCALE * median(&abs)).max(SIGMA_FLOOR);
    let uncertainty = solve.uncertainty(sigma)?;
    Ok(ItemState::new(
        solve.solution.iter().copied().collect(),
        uncertainty,
        polarity.to_vec(),
    ))
}

fn median(sorted: &[f64]) -> f64 {
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 1 => sorted[n / 2],
        n => 0.5 * (sorted[n / 2 - 1] + sorted[n / 2]),
    }
}
