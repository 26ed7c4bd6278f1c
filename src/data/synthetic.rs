//! Synthetic multi-candidate lag problems.
//!
//! Each pair gets `P` ranked candidates. Exactly one is the true lag plus
//! Gaussian noise; the others sit a whole number of periods away (the usual
//! cycle-skip failure of peak picking) and may carry flipped polarity.
//! Correlations decrease with rank, so whatever lands on rank 0 looks best.

use nalgebra::DMatrix;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::AlignConfig;
use crate::error::AlignError;
use crate::pairs::{CompactPairs, PairIndex, PairValues};
use crate::refine::CandidateSet;

/// Half-width of the uniform range true times are drawn from, in periods.
const TIME_SPREAD_PERIODS: f64 = 5.0;

/// Adjacent correlation samples kept on each side of a peak.
const ADJACENT_HALF_WIDTH: usize = 1;

#[derive(Debug, Clone)]
pub struct SyntheticProblem {
    /// Zero-mean ground-truth times.
    pub truth: Vec<f64>,
    /// Target polarity per item.
    pub polarity: Vec<i8>,
    pub candidates: CandidateSet,
    /// Rank of the true candidate per compact pair, before any refinement.
    pub correct_rank: Vec<usize>,
}

impl SyntheticProblem {
    pub fn items(&self) -> usize {
        self.truth.len()
    }

    /// Pairs whose rank-0 lag is within half a period of the truth.
    pub fn correct_on_top(&self, set: &CandidateSet, period: f64) -> usize {
        let index = PairIndex::new(self.items());
        index
            .iter()
            .filter(|&(i, j)| {
                let top = set.lag().directed(j, i, 0, crate::pairs::Symmetry::Antisymmetric);
                (top - (self.truth[j] - self.truth[i])).abs() < 0.5 * period
            })
            .count()
    }
}

pub fn generate_problem(config: &AlignConfig) -> Result<SyntheticProblem, AlignError> {
    config.validate()?;

    let n = config.items;
    let p = config.candidates;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AlignError::config(format!("noise distribution error: {e}")))?;

    let spread = TIME_SPREAD_PERIODS * config.period;
    let mut truth: Vec<f64> = (0..n).map(|_| rng.gen_range(-spread..spread)).collect();
    let mean = truth.iter().sum::<f64>() / n as f64;
    truth.iter_mut().for_each(|t| *t -= mean);

    let polarity: Vec<i8> = (0..n).map(|_| if rng.gen_bool(0.5) { 1 } else { -1 }).collect();

    let index = PairIndex::new(n);
    let len = index.len();
    let mut corr = vec![vec![0.0; len]; p];
    let mut lag = vec![vec![0.0; len]; p];
    let mut pol = vec![vec![0.0; len]; p];
    let mut correct_rank = Vec::with_capacity(len);

    for (k, (i, j)) in index.iter().enumerate() {
        let true_lag = truth[j] - truth[i];
        let product = f64::from(polarity[i] * polarity[j]);

        let correct = if p > 1 && rng.gen_bool(config.outlier_prob) {
            rng.gen_range(1..p)
        } else {
            0
        };
        correct_rank.push(correct);

        let mut c: f64 = rng.gen_range(0.85..0.99);
        for rank in 0..p {
            corr[rank][k] = c;
            c = (c - rng.gen_range(0.02..0.10)).max(0.05);

            let jitter = config.noise * normal.sample(&mut rng);
            if rank == correct {
                lag[rank][k] = true_lag + jitter;
                pol[rank][k] = product;
            } else {
                let cycles = rng.gen_range(1..=2) as f64;
                let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                lag[rank][k] = true_lag + sign * cycles * config.period + jitter;
                pol[rank][k] = if rng.gen_bool(config.flip_prob) { -product } else { product };
            }
        }
    }

    let adjacent: Vec<DMatrix<f64>> = corr.iter().map(|ranked| adjacent_samples(ranked)).collect();
    let set = CandidateSet::new(
        PairValues::Compact(CompactPairs::from_ranks(&corr)?),
        PairValues::Compact(CompactPairs::from_ranks(&lag)?),
        PairValues::Compact(CompactPairs::from_ranks(&pol)?),
    )?;
    let candidates = if config.grid {
        set.into_grid()?
    } else {
        set.with_adjacent(adjacent)?
    };

    Ok(SyntheticProblem {
        truth,
        polarity,
        candidates,
        correct_rank,
    })
}

/// Samples of a unit-curvature parabola around each peak value.
fn adjacent_samples(peaks: &[f64]) -> DMatrix<f64> {
    let width = 2 * ADJACENT_HALF_WIDTH + 1;
    DMatrix::from_fn(peaks.len(), width, |k, s| {
        let offset = s as f64 - ADJACENT_HALF_WIDTH as f64;
        peaks[k] - 0.05 * offset * offset
    })
}
