//! Terminal and JSON output for alignment runs.
//!
//! Formatting lives here so the solver and refinement code stay free of
//! presentation concerns.

use chrono::Local;
use serde::Serialize;

use crate::app::pipeline::{AlignmentRun, IterationRecord, TrialRun};
use crate::domain::{AlignConfig, ItemState, RunMode};
use crate::refine::Diagnostics;

/// Rows of the diagnostics table to print before eliding.
const MAX_PENDING_ROWS: usize = 20;

/// Serializable view of a run (`--json`).
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub config: &'a AlignConfig,
    pub converged: bool,
    pub rcond: f64,
    pub rms_residual: f64,
    pub truth: &'a [f64],
    pub solution: Vec<f64>,
    pub state: &'a ItemState,
    pub history: &'a [IterationRecord],
    pub diagnostics: Option<&'a Diagnostics>,
}

impl<'a> RunSummary<'a> {
    pub fn new(run: &'a AlignmentRun, config: &'a AlignConfig) -> Self {
        Self {
            config,
            converged: run.converged,
            rcond: run.solve.rcond,
            rms_residual: run.solve.rms_residual(),
            truth: &run.problem.truth,
            solution: run.solve.solution.iter().copied().collect(),
            state: &run.state,
            history: &run.history,
            diagnostics: run.diagnostics.as_ref(),
        }
    }
}

/// Format the full run summary.
pub fn format_run_summary(run: &AlignmentRun, config: &AlignConfig) -> String {
    let mut out = String::new();

    out.push_str("=== lagalign - pairwise lag alignment ===\n");
    out.push_str(&format!("Generated: {}\n", Local::now().to_rfc3339()));
    out.push_str(&format!(
        "Problem: items={} | candidates={} | form={} | seed={}\n",
        config.items,
        config.candidates,
        if config.grid { "grid" } else { "compact" },
        config.seed
    ));
    out.push_str(&format!(
        "Noise: sigma={:.4} | period={:.3} | outlier_prob={:.2} | flip_prob={:.2}\n",
        config.noise, config.period, config.outlier_prob, config.flip_prob
    ));
    out.push_str(&format!(
        "Refine: min_std={:.2} | force_polarity={} | iterations={}\n",
        config.min_std, config.force_polarity, config.iterations
    ));
    out.push_str(&format!(
        "Solve: rcond={:.3e} | rms_residual={:.6}\n",
        run.solve.rcond,
        run.solve.rms_residual()
    ));

    out.push_str("\nItems:\n");
    out.push_str(&format_solution(run));

    if config.mode == RunMode::Refine {
        out.push_str("\nRefinement:\n");
        out.push_str(&format_history(&run.history));
        out.push_str(&format!(
            "{}\n",
            if run.converged {
                "converged (no swaps in last pass)"
            } else {
                "stopped at iteration budget"
            }
        ));
    }

    if let Some(diag) = &run.diagnostics {
        out.push_str("\nDiagnostics:\n");
        out.push_str(&format_diagnostics(diag));
    }

    out
}

/// One line per trial of a batch.
pub fn format_trials(trials: &[TrialRun], config: &AlignConfig) -> String {
    let pairs = config.items * (config.items - 1) / 2;
    let mut out = String::new();

    out.push_str("=== lagalign - pairwise lag alignment (trials) ===\n");
    out.push_str(&format!("Generated: {}\n", Local::now().to_rfc3339()));
    out.push_str(&format!(
        "Problem: items={} | candidates={} | form={} | trials={}\n\n",
        config.items,
        config.candidates,
        if config.grid { "grid" } else { "compact" },
        trials.len()
    ));
    out.push_str(&format!(
        "{:>8} {:>14} {:>7} {:>10} {:>10} {:>12}\n",
        "seed", "rms_residual", "passes", "converged", "correct", "max_error"
    ));
    for trial in trials {
        let run = &trial.run;
        out.push_str(&format!(
            "{:>8} {:>14.6} {:>7} {:>10} {:>10} {:>12.2e}\n",
            trial.config.seed,
            run.solve.rms_residual(),
            run.history.len(),
            run.converged,
            format!("{}/{pairs}", run.problem.correct_on_top(&run.candidates, config.period)),
            trial.max_error()
        ));
    }
    let converged = trials.iter().filter(|t| t.run.converged).count();
    out.push_str(&format!("{converged}/{} trial(s) converged\n", trials.len()));
    out
}

fn format_solution(run: &AlignmentRun) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>5} {:>12} {:>12} {:>12} {:>10} {:>4}\n",
        "item", "truth", "solution", "error", "sigma", "pol"
    ));
    for (k, truth) in run.problem.truth.iter().enumerate() {
        let s = run.solve.solution[k];
        out.push_str(&format!(
            "{:>5} {:>12.6} {:>12.6} {:>12.2e} {:>10.2e} {:>4}\n",
            k,
            truth,
            s,
            s - truth,
            run.state.uncertainty[k],
            run.state.polarity[k]
        ));
    }
    out
}

pub fn format_history(history: &[IterationRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>5} {:>14} {:>8} {:>8}\n",
        "pass", "rms_residual", "swapped", "correct"
    ));
    for rec in history {
        out.push_str(&format!(
            "{:>5} {:>14.6} {:>8} {:>8}\n",
            rec.iteration, rec.rms_residual, rec.swapped_pairs, rec.correct_on_top
        ));
    }
    out
}

pub fn format_diagnostics(diag: &Diagnostics) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} slot(s) would change rank 1, {} pair(s) fully excluded by polarity\n",
        diag.pending.len(),
        diag.unresolved.len()
    ));
    if diag.pending.is_empty() {
        return out;
    }

    out.push_str(&format!("{:>5} {:>5} {:>7}  scores\n", "row", "col", "winner"));
    for (slot, winner) in diag.pending.iter().zip(&diag.winners).take(MAX_PENDING_ROWS) {
        let scores = diag
            .table
            .slots
            .iter()
            .position(|s| s == slot)
            .map(|s| fmt_scores(&diag.table.scores[s]))
            .unwrap_or_default();
        out.push_str(&format!(
            "{:>5} {:>5} {:>7}  {scores}\n",
            slot.row,
            slot.col,
            winner + 1
        ));
    }
    if diag.pending.len() > MAX_PENDING_ROWS {
        out.push_str(&format!("  ... {} more\n", diag.pending.len() - MAX_PENDING_ROWS));
    }
    out
}

fn fmt_scores(scores: &[Option<f64>]) -> String {
    let parts: Vec<String> = scores
        .iter()
        .map(|s| match s {
            Some(v) if v.is_finite() => format!("{v:.3}"),
            Some(_) => "inf".to_string(),
            None => "-".to_string(),
        })
        .collect();
    format!("[{}]", parts.join(", "))
}
