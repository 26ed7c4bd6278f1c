//! Per-item travel-time estimates from pairwise lags.
//!
//! Only the rank-1 candidate of each pair is used; callers that refine
//! candidates re-run the solver after each refinement pass.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::AbsoluteTies;
use crate::error::AlignError;
use crate::math::{propagate_covariance, weighted_inverse};
use crate::pairs::{PairIndex, PairValues, Symmetry};
use crate::solver::design::build_system;

/// Solver output.
#[derive(Debug, Clone)]
pub struct SolveOutput {
    /// Per-item time estimate. Zero-sum unless anchored by ties.
    pub solution: DVector<f64>,
    /// Generalized inverse: `solution = ginv · [lags; constraint data]`.
    pub ginv: DMatrix<f64>,
    /// Rank-1 lags used, in compact order.
    pub lags: DVector<f64>,
    /// Row weights, pair rows first.
    pub row_weights: DVector<f64>,
    pub index: PairIndex,
    pub anchored: bool,
    /// Reciprocal condition number of the normal matrix.
    pub rcond: f64,
}

impl SolveOutput {
    pub fn items(&self) -> usize {
        self.index.items()
    }

    /// `lag - (s_j - s_i)` per compact pair.
    pub fn residuals(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.index.len(),
            self.index
                .iter()
                .enumerate()
                .map(|(k, (i, j))| self.lags[k] - (self.solution[j] - self.solution[i])),
        )
    }

    /// Weighted root-mean-square of the pair residuals.
    pub fn rms_residual(&self) -> f64 {
        let r = self.residuals();
        let mut num = 0.0;
        let mut den = 0.0;
        for (k, v) in r.iter().enumerate() {
            let w = self.row_weights[k];
            num += w * v * v;
            den += w;
        }
        if den > 0.0 { (num / den).sqrt() } else { 0.0 }
    }

    /// Solution covariance assuming observation variance `1 / weight`.
    ///
    /// Zero-weight rows carry no information and get zero variance. The
    /// zero-sum row is an exact constraint, not an observation, so it
    /// contributes nothing either.
    pub fn covariance(&self) -> Result<DMatrix<f64>, AlignError> {
        let pair_rows = self.index.len();
        let var = DVector::from_iterator(
            self.row_weights.len(),
            self.row_weights.iter().enumerate().map(|(r, &w)| {
                if r >= pair_rows && !self.anchored {
                    0.0
                } else if w > 0.0 {
                    1.0 / w
                } else {
                    0.0
                }
            }),
        );
        propagate_covariance(&self.ginv, &var)
    }

    /// Square root of the covariance diagonal, scaled by `sigma`.
    pub fn uncertainty(&self, sigma: f64) -> Result<Vec<f64>, AlignError> {
        let cov = self.covariance()?;
        Ok(cov.diagonal().iter().map(|v| sigma * v.max(0.0).sqrt()).collect())
    }
}

/// Solve for per-item times from pairwise lags.
///
/// - `lags`: antisymmetric pairwise lags, compact or grid; rank 1 is used.
/// - `weights`: symmetric pairwise weights for the same items (default 1).
/// - `ties`: optional absolute anchors, replacing the zero-sum constraint.
pub fn solve_travel_times(
    lags: &PairValues,
    weights: Option<&PairValues>,
    ties: Option<&AbsoluteTies>,
) -> Result<SolveOutput, AlignError> {
    lags.validate(Symmetry::Antisymmetric)?;
    let n = lags.items();
    let index = PairIndex::new(n);

    let lag_vec = lags.to_compact().rank(0);
    if let Some(v) = lag_vec.iter().find(|v| !v.is_finite()) {
        return Err(AlignError::value(format!("lag {v} is not finite")));
    }

    let weight_vec = match weights {
        None => DVector::from_element(index.len(), 1.0),
        Some(w) => {
            if w.items() != n {
                return Err(AlignError::size(format!(
                    "weights describe {} items but lags describe {n}",
                    w.items()
                )));
            }
            w.validate(Symmetry::Symmetric)?;
            let w = w.to_compact().rank(0);
            if let Some(v) = w.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
                return Err(AlignError::value(format!("pair weight {v} must be finite and >= 0")));
            }
            w
        }
    };

    if let Some(t) = ties {
        t.check_items(n)?;
    }

    let system = build_system(&index, &lag_vec, &weight_vec, ties);
    debug!(
        items = n,
        rows = system.design.nrows(),
        anchored = ties.is_some(),
        "solving travel-time system"
    );

    let inv = weighted_inverse(&system.design, &system.weights)?;
    let solution = &inv.ginv * &system.data;
    debug!(rcond = inv.rcond, "travel-time system solved");

    Ok(SolveOutput {
        solution,
        ginv: inv.ginv,
        lags: lag_vec,
        row_weights: system.weights,
        index,
        anchored: ties.is_some(),
        rcond: inv.rcond,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairs::CompactPairs;

    fn lags_from_times(t: &[f64]) -> PairValues {
        let idx = PairIndex::new(t.len());
        let lags: Vec<f64> = idx.iter().map(|(i, j)| t[j] - t[i]).collect();
        PairValues::compact(&lags).unwrap()
    }

    #[test]
    fn four_item_scenario_is_mean_shifted() {
        let out = solve_travel_times(&lags_from_times(&[0.0, 2.0, 5.0, 9.0]), None, None).unwrap();
        let expected = [-4.0, -2.0, 1.0, 5.0];
        for (got, want) in out.solution.iter().zip(expected) {
            assert!((got - want).abs() < 1e-10, "got {got}, want {want}");
        }
    }

    #[test]
    fn solution_is_zero_sum_without_ties() {
        let lags = PairValues::compact(&[0.3, -1.2, 4.0, 2.2, -0.7, 1.1, 0.0, 5.5, -3.0, 0.9]).unwrap();
        let out = solve_travel_times(&lags, None, None).unwrap();
        assert!(out.solution.sum().abs() < 1e-10);
    }

    #[test]
    fn exact_recovery_up_to_constant() {
        let t = [3.5, -1.25, 0.0, 8.0, 2.75, -6.5, 1.0];
        let out = solve_travel_times(&lags_from_times(&t), None, None).unwrap();
        let t_mean = t.iter().sum::<f64>() / t.len() as f64;
        let s_mean = out.solution.mean();
        for (k, &tk) in t.iter().enumerate() {
            assert!(((out.solution[k] - s_mean) - (tk - t_mean)).abs() < 1e-10);
        }
        assert!(out.rms_residual() < 1e-10);
    }

    #[test]
    fn grid_and_compact_give_same_solution() {
        let compact = lags_from_times(&[0.0, 2.0, 5.0, 9.0, -1.0]);
        let grid = PairValues::Grid(compact.to_grid(Symmetry::Antisymmetric));
        let a = solve_travel_times(&compact, None, None).unwrap();
        let b = solve_travel_times(&grid, None, None).unwrap();
        assert!((a.solution - b.solution).abs().max() < 1e-12);
    }

    #[test]
    fn heavy_tie_anchors_item() {
        let lags = lags_from_times(&[0.0, 2.0, 5.0, 9.0]);
        let mut previous = f64::INFINITY;
        for weight in [1.0, 1e2, 1e4, 1e6, 1e8, 1e10, 1e12] {
            // Inconsistent ties: item 1 pulled to 100, item 3 to 0.
            let ties = AbsoluteTies::new(vec![100.0, 0.0], vec![weight, 1.0], vec![1, 3]).unwrap();
            let out = solve_travel_times(&lags, None, Some(&ties)).unwrap();
            let miss = (out.solution[1] - 100.0).abs();
            assert!(miss <= previous + 1e-9, "weight {weight}: miss {miss} after {previous}");
            previous = miss;
        }
        assert!(previous < 1e-8, "miss {previous}");
    }

    #[test]
    fn single_heavy_tie_is_not_singular() {
        let t = [0.0, 2.0, 5.0, 9.0];
        let ties = AbsoluteTies::new(vec![7.0], vec![1e12], vec![1]).unwrap();
        let out = solve_travel_times(&lags_from_times(&t), None, Some(&ties)).unwrap();
        for (k, &tk) in t.iter().enumerate() {
            assert!((out.solution[k] - (tk + 5.0)).abs() < 1e-8, "item {k}: {}", out.solution[k]);
        }
    }

    #[test]
    fn large_uniform_weights_keep_zero_sum() {
        let lags = lags_from_times(&[0.0, 2.0, 5.0, 9.0]);
        let expected = [-4.0, -2.0, 1.0, 5.0];
        for weight in [1e6, 1e12] {
            let weights = PairValues::compact(&[weight; 6]).unwrap();
            let out = solve_travel_times(&lags, Some(&weights), None).unwrap();
            assert!(out.solution.sum().abs() < 1e-9, "weight {weight}: sum {}", out.solution.sum());
            for (got, want) in out.solution.iter().zip(expected) {
                assert!((got - want).abs() < 1e-9, "weight {weight}: got {got}, want {want}");
            }
        }
    }

    #[test]
    fn uneven_weights_keep_zero_sum() {
        let lags = PairValues::compact(&[0.3, -1.2, 4.0, 2.2, -0.7, 1.1]).unwrap();
        let weights = PairValues::compact(&[1e9, 1.0, 1e6, 1e3, 1e9, 1e-3]).unwrap();
        let out = solve_travel_times(&lags, Some(&weights), None).unwrap();
        assert!(out.solution.sum().abs() < 1e-8, "sum {}", out.solution.sum());
    }

    #[test]
    fn consistent_ties_recover_absolute_times() {
        let t = [10.0, 12.0, 15.0, 19.0];
        let ties = AbsoluteTies::uniform(vec![10.0], 1.0, vec![0]).unwrap();
        let out = solve_travel_times(&lags_from_times(&t), None, Some(&ties)).unwrap();
        for (k, &tk) in t.iter().enumerate() {
            assert!((out.solution[k] - tk).abs() < 1e-9);
        }
        assert!(out.anchored);
    }

    #[test]
    fn disconnected_graph_is_singular() {
        // Items {0,1} and {2,3} never observed against each other.
        let lags = PairValues::compact(&[1.0, 0.0, 0.0, 0.0, 0.0, 2.0]).unwrap();
        let weights = PairValues::compact(&[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
        let err = solve_travel_times(&lags, Some(&weights), None).unwrap_err();
        assert!(matches!(err, AlignError::Singular(_)), "got {err:?}");
    }

    #[test]
    fn weight_item_mismatch_is_size_error() {
        let lags = lags_from_times(&[0.0, 1.0, 2.0, 3.0]);
        let weights = PairValues::compact(&[1.0, 1.0, 1.0]).unwrap();
        let err = solve_travel_times(&lags, Some(&weights), None).unwrap_err();
        assert!(matches!(err, AlignError::Size(_)));
    }

    #[test]
    fn negative_weights_are_rejected() {
        let lags = lags_from_times(&[0.0, 1.0, 2.0]);
        let weights = PairValues::compact(&[1.0, -1.0, 1.0]).unwrap();
        let err = solve_travel_times(&lags, Some(&weights), None).unwrap_err();
        assert!(matches!(err, AlignError::Value(_)));
    }

    #[test]
    fn non_antisymmetric_lag_grid_is_rejected() {
        let lags = lags_from_times(&[0.0, 1.0, 2.0]);
        let grid = lags.to_grid(Symmetry::Symmetric);
        let err = solve_travel_times(&PairValues::Grid(grid), None, None).unwrap_err();
        assert!(matches!(err, AlignError::Structure(_)));
    }

    #[test]
    fn only_top_candidate_is_used() {
        let top = [2.0, 5.0, 3.0];
        let other = [100.0, -100.0, 7.0];
        let lags = CompactPairs::from_ranks(&[top.to_vec(), other.to_vec()]).unwrap();
        let out = solve_travel_times(&PairValues::Compact(lags), None, None).unwrap();
        let single = solve_travel_times(&PairValues::compact(&top).unwrap(), None, None).unwrap();
        assert_eq!(out.solution, single.solution);
    }

    #[test]
    fn downweighted_outlier_has_less_pull() {
        let mut lags = vec![2.0, 5.0, 9.0, 3.0, 7.0, 4.0];
        lags[5] += 10.0;
        let lags = PairValues::compact(&lags).unwrap();
        let even = solve_travel_times(&lags, None, None).unwrap();
        let weights = PairValues::compact(&[1.0, 1.0, 1.0, 1.0, 1.0, 1e-6]).unwrap();
        let skewed = solve_travel_times(&lags, Some(&weights), None).unwrap();
        assert!(skewed.rms_residual() < even.rms_residual());
    }

    #[test]
    fn zero_sum_row_adds_no_variance() {
        // Complete graph, unit weights: var(s_k) = (n - 1) / n².
        let out = solve_travel_times(&lags_from_times(&[0.0, 1.0, 2.0, 3.0]), None, None).unwrap();
        for u in out.uncertainty(1.0).unwrap() {
            assert!((u - 3f64.sqrt() / 4.0).abs() < 1e-12, "got {u}");
        }
        // Uncertainty scales as 1 / sqrt(w) with the pair weights.
        let weights = PairValues::compact(&[1e4; 6]).unwrap();
        let heavy = solve_travel_times(&lags_from_times(&[0.0, 1.0, 2.0, 3.0]), Some(&weights), None).unwrap();
        for u in heavy.uncertainty(1.0).unwrap() {
            assert!((u - 3f64.sqrt() / 400.0).abs() < 1e-12, "got {u}");
        }
    }

    #[test]
    fn uncertainty_is_positive_and_symmetric_for_uniform_weights() {
        let out = solve_travel_times(&lags_from_times(&[0.0, 1.0, 2.0, 3.0, 4.0]), None, None).unwrap();
        let u = out.uncertainty(1.0).unwrap();
        assert_eq!(u.len(), 5);
        for v in &u {
            assert!(*v > 0.0);
            assert!((v - u[0]).abs() < 1e-12);
        }
    }
}
