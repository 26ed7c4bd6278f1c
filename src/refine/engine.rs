//! Polarity-constrained reordering of candidate peaks.
//!
//! One pass scores every candidate (`score`), picks the lowest score per
//! slot, and swaps the winner into rank 0. There is no internal iteration;
//! callers alternate refinement with re-solving.

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{ItemState, PairSlot, RefineOptions};
use crate::error::AlignError;
use crate::refine::candidates::CandidateSet;
use crate::refine::score::{CandidateWeights, ScoreTable, score_candidates};

/// A candidate promoted to rank 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Swap {
    pub slot: PairSlot,
    pub from_rank: usize,
}

/// Result of a mutating pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefineReport {
    /// Number of pairs whose rank 0 changed. Grid passes touch both halves
    /// of a pair; this counts the pair once.
    pub swapped_pairs: usize,
    /// Swaps performed, one entry per pair (lower-triangle slot for grids).
    pub swaps: Vec<Swap>,
    /// Pairs where polarity excluded every candidate; rank 0 was kept.
    pub unresolved: Vec<PairSlot>,
}

/// Result of a diagnostic pass; candidate arrays are untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Slots whose best candidate is not at rank 0.
    pub pending: Vec<PairSlot>,
    /// Winning rank for each entry of `pending`.
    pub winners: Vec<usize>,
    pub unresolved: Vec<PairSlot>,
    pub table: ScoreTable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RefineOutcome {
    Applied(RefineReport),
    Diagnosed(Diagnostics),
}

impl RefineOutcome {
    /// Pairs swapped, or pairs that would be swapped in diagnostic mode.
    pub fn pair_changes(&self, grid: bool) -> usize {
        match self {
            RefineOutcome::Applied(r) => r.swapped_pairs,
            RefineOutcome::Diagnosed(d) if grid => d.pending.len() / 2,
            RefineOutcome::Diagnosed(d) => d.pending.len(),
        }
    }
}

/// Score candidates and report which slots would change, without mutating.
pub fn diagnose_peaks(
    set: &CandidateSet,
    state: &ItemState,
    weights: &CandidateWeights,
    opts: &RefineOptions,
) -> Result<Diagnostics, AlignError> {
    let table = score_candidates(set, state, weights, opts)?;

    let mut pending = Vec::new();
    let mut winners = Vec::new();
    let mut unresolved = Vec::new();
    for (s, &slot) in table.slots.iter().enumerate() {
        match table.best_rank(s) {
            Some(0) => {}
            Some(rank) => {
                pending.push(slot);
                winners.push(rank);
            }
            None => {
                if !set.is_grid() || slot.row > slot.col {
                    unresolved.push(slot);
                }
            }
        }
    }

    if !unresolved.is_empty() {
        warn!(
            pairs = unresolved.len(),
            "every candidate excluded by polarity; keeping rank 1"
        );
    }

    Ok(Diagnostics {
        pending,
        winners,
        unresolved,
        table,
    })
}

/// Move the best-matching candidate of every pair to rank 0.
///
/// With `opts.diagnostic_only` the set is left untouched and the full
/// diagnostics are returned instead.
pub fn refine_peaks(
    set: &mut CandidateSet,
    state: &ItemState,
    weights: &CandidateWeights,
    opts: &RefineOptions,
) -> Result<RefineOutcome, AlignError> {
    let diag = diagnose_peaks(set, state, weights, opts)?;
    if opts.diagnostic_only {
        debug!(pending = diag.pending.len(), "diagnostic refinement pass");
        return Ok(RefineOutcome::Diagnosed(diag));
    }

    let grid = set.is_grid();
    let mut swaps = Vec::with_capacity(diag.pending.len());
    for (&slot, &rank) in diag.pending.iter().zip(diag.winners.iter()) {
        set.swap(slot, 0, rank);
        if !grid || slot.row > slot.col {
            swaps.push(Swap {
                slot,
                from_rank: rank,
            });
        }
    }

    let swapped_cells = diag.pending.len();
    let swapped_pairs = if grid { swapped_cells / 2 } else { swapped_cells };
    debug!(swapped_pairs, "refinement pass applied");

    Ok(RefineOutcome::Applied(RefineReport {
        swapped_pairs,
        swaps,
        unresolved: diag.unresolved,
    }))
}
