//! Misfit scoring of candidates against the current solution.
//!
//! For slot `(r, c)` and a candidate with lag `ℓ` and weight `w`:
//!
//! ```text
//! z     = |ℓ - (s_r - s_c)| / sqrt(u_r² + u_c²)
//! score = max(min_std, z) / w
//! ```
//!
//! Below `min_std` standard deviations the timing term is flat, so ranking
//! among "good enough" candidates falls to the weight. A candidate whose
//! polarity differs from `π_r · π_c` has no score when polarity is forced.

use serde::{Serialize, Serializer};

use crate::domain::{ItemState, PairSlot, RefineOptions};
use crate::error::AlignError;
use crate::pairs::{PairValues, Symmetry};
use crate::refine::candidates::CandidateSet;

/// Per-candidate weights dividing the misfit.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateWeights {
    /// One weight everywhere.
    Uniform(f64),
    /// One weight per candidate rank.
    PerRank(Vec<f64>),
    /// Full pairwise weights with 1 or P candidate ranks.
    PerPair(PairValues),
}

impl Default for CandidateWeights {
    fn default() -> Self {
        CandidateWeights::Uniform(1.0)
    }
}

impl CandidateWeights {
    pub fn validate(&self, items: usize, candidates: usize) -> Result<(), AlignError> {
        let values: Vec<f64> = match self {
            CandidateWeights::Uniform(w) => vec![*w],
            CandidateWeights::PerRank(ws) => {
                if ws.len() != candidates {
                    return Err(AlignError::size(format!(
                        "{} rank weights for {candidates} candidates",
                        ws.len()
                    )));
                }
                ws.clone()
            }
            CandidateWeights::PerPair(pw) => {
                if pw.items() != items {
                    return Err(AlignError::size(format!(
                        "candidate weights describe {} items, expected {items}",
                        pw.items()
                    )));
                }
                if pw.candidates() != 1 && pw.candidates() != candidates {
                    return Err(AlignError::size(format!(
                        "candidate weights have {} ranks, expected 1 or {candidates}",
                        pw.candidates()
                    )));
                }
                pw.validate(Symmetry::Symmetric)?;
                pw.values()
            }
        };
        match values.iter().find(|w| !(w.is_finite() && **w > 0.0)) {
            Some(w) => Err(AlignError::value(format!("candidate weight {w} must be finite and > 0"))),
            None => Ok(()),
        }
    }

    fn weight(&self, slot: PairSlot, rank: usize) -> f64 {
        match self {
            CandidateWeights::Uniform(w) => *w,
            CandidateWeights::PerRank(ws) => ws[rank],
            CandidateWeights::PerPair(pw) => {
                let rank = if pw.candidates() == 1 { 0 } else { rank };
                pw.directed(slot.row, slot.col, rank, Symmetry::Symmetric)
            }
        }
    }
}

/// Floored, weighted z-score of one observed lag.
pub fn misfit(observed: f64, predicted: f64, sigma: f64, weight: f64, min_std: f64) -> f64 {
    let resid = (observed - predicted).abs();
    let z = if sigma > 0.0 {
        resid / sigma
    } else if resid == 0.0 {
        0.0
    } else {
        f64::INFINITY
    };
    z.max(min_std) / weight
}

/// Scores for every slot and candidate rank. `None` marks an ineligible
/// candidate.
///
/// In JSON an ineligible candidate is `null` and an infinite score is the
/// string `"inf"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreTable {
    pub slots: Vec<PairSlot>,
    #[serde(serialize_with = "serialize_scores")]
    pub scores: Vec<Vec<Option<f64>>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum JsonScore {
    Value(f64),
    Label(&'static str),
    Excluded,
}

impl From<Option<f64>> for JsonScore {
    fn from(score: Option<f64>) -> Self {
        match score {
            None => JsonScore::Excluded,
            Some(v) if v.is_finite() => JsonScore::Value(v),
            Some(v) if v.is_nan() => JsonScore::Label("nan"),
            Some(v) if v > 0.0 => JsonScore::Label("inf"),
            Some(_) => JsonScore::Label("-inf"),
        }
    }
}

fn serialize_scores<S: Serializer>(scores: &[Vec<Option<f64>>], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(
        scores
            .iter()
            .map(|row| row.iter().map(|&s| JsonScore::from(s)).collect::<Vec<_>>()),
    )
}

impl ScoreTable {
    /// Lowest-scoring eligible rank at slot index `s`; ties keep the lower rank.
    pub fn best_rank(&self, s: usize) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (rank, score) in self.scores[s].iter().enumerate() {
            let Some(score) = *score else { continue };
            match best {
                Some((_, current)) if score >= current => {}
                _ => best = Some((rank, score)),
            }
        }
        best.map(|(rank, _)| rank)
    }
}

/// Score every candidate of every slot.
pub fn score_candidates(
    set: &CandidateSet,
    state: &ItemState,
    weights: &CandidateWeights,
    opts: &RefineOptions,
) -> Result<ScoreTable, AlignError> {
    opts.validate()?;
    let n = set.items();
    let p = set.candidates();
    state.validate(n, opts.force_polarity)?;
    weights.validate(n, p)?;
    if opts.force_polarity {
        if let Some(v) = set.polarity().values().into_iter().find(|v| *v == 0.0) {
            return Err(AlignError::value(format!(
                "candidate polarity {v} is not allowed when polarity is forced"
            )));
        }
    }

    let slots = set.slots();
    let scores: Vec<Vec<Option<f64>>> = slots
        .iter()
        .map(|&slot| {
            let predicted = state.solution[slot.row] - state.solution[slot.col];
            let (ur, uc) = (state.uncertainty[slot.row], state.uncertainty[slot.col]);
            let sigma = (ur * ur + uc * uc).sqrt();
            let expected = f64::from(state.polarity[slot.row] * state.polarity[slot.col]);
            (0..p)
                .map(|rank| {
                    let cand = set.get(slot, rank);
                    if opts.force_polarity && cand.polarity != expected {
                        return None;
                    }
                    Some(misfit(cand.lag, predicted, sigma, weights.weight(slot, rank), opts.min_std))
                })
                .collect()
        })
        .collect();

    Ok(ScoreTable { slots, scores })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairs::CompactPairs;

    #[test]
    fn misfit_is_floored_at_min_std() {
        assert_eq!(misfit(1.0, 1.05, 0.1, 1.0, 2.0), 2.0);
        assert!((misfit(1.0, 2.0, 0.1, 1.0, 2.0) - 10.0).abs() < 1e-9);
        assert!((misfit(1.0, 2.0, 0.1, 2.0, 2.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn json_keeps_infinite_apart_from_excluded() {
        let table = ScoreTable {
            slots: vec![PairSlot { row: 1, col: 0 }],
            scores: vec![vec![Some(2.5), Some(f64::INFINITY), None]],
        };
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["scores"], serde_json::json!([[2.5, "inf", null]]));
    }

    #[test]
    fn zero_sigma_is_exact_or_infinite() {
        assert_eq!(misfit(1.0, 1.0, 0.0, 1.0, 2.0), 2.0);
        assert_eq!(misfit(1.0, 1.5, 0.0, 1.0, 2.0), f64::INFINITY);
    }

    #[test]
    fn best_rank_skips_missing_and_keeps_first_tie() {
        let table = ScoreTable {
            slots: vec![PairSlot { row: 1, col: 0 }; 3],
            scores: vec![
                vec![None, Some(3.0), Some(2.0)],
                vec![Some(2.0), Some(2.0), None],
                vec![None, None, None],
            ],
        };
        assert_eq!(table.best_rank(0), Some(2));
        assert_eq!(table.best_rank(1), Some(0));
        assert_eq!(table.best_rank(2), None);
    }

    #[test]
    fn rank_weights_must_match_candidate_count() {
        let err = CandidateWeights::PerRank(vec![1.0, 1.0]).validate(3, 3).unwrap_err();
        assert!(matches!(err, AlignError::Size(_)));
    }

    #[test]
    fn non_positive_weight_is_rejected() {
        let err = CandidateWeights::Uniform(0.0).validate(3, 1).unwrap_err();
        assert!(matches!(err, AlignError::Value(_)));
        let pw = PairValues::Compact(CompactPairs::from_slice(&[1.0, -1.0, 1.0]).unwrap());
        let err = CandidateWeights::PerPair(pw).validate(3, 2).unwrap_err();
        assert!(matches!(err, AlignError::Value(_)));
    }

    #[test]
    fn single_rank_pair_weights_broadcast() {
        let pw = PairValues::Compact(CompactPairs::from_slice(&[1.0, 2.0, 4.0]).unwrap());
        let weights = CandidateWeights::PerPair(pw);
        weights.validate(3, 5).unwrap();
        assert_eq!(weights.weight(PairSlot { row: 2, col: 1 }, 4), 4.0);
        assert_eq!(weights.weight(PairSlot { row: 1, col: 2 }, 0), 4.0);
    }
}
