//! Design rows, weights and data vector for the travel-time system.
//!
//! Row layout (top to bottom):
//!
//! 1. one row per compact pair `(i, j)`: `-1` at `i`, `+1` at `j`, so the row
//!    predicts `s_j - s_i`;
//! 2. either a single all-ones zero-sum row (datum 0), or one row per absolute
//!    tie with `+1` at the tied item (tie weight, tie value).
//!
//! The zero-sum row only fixes the free constant, which pair rows cannot see,
//! so its weight does not change the solution. It is set to the mean pair
//! weight to keep the normal matrix on one scale.

use nalgebra::DVector;

use crate::domain::AbsoluteTies;
use crate::math::SparseDesign;
use crate::pairs::PairIndex;

/// Weight of the zero-sum row: the mean pair weight, or 1 when every pair
/// weight is zero.
pub fn zero_sum_weight(pair_weights: &DVector<f64>) -> f64 {
    let mean = if pair_weights.is_empty() { 0.0 } else { pair_weights.mean() };
    if mean.is_finite() && mean > 0.0 { mean } else { 1.0 }
}

#[derive(Debug, Clone)]
pub struct TravelTimeSystem {
    pub design: SparseDesign,
    pub weights: DVector<f64>,
    pub data: DVector<f64>,
    /// Number of leading rows that are pair observations.
    pub pair_rows: usize,
}

/// Assemble the weighted system.
///
/// `lags` and `pair_weights` are in compact order for `index`; tie items must
/// already be checked against `index.items()`.
pub fn build_system(
    index: &PairIndex,
    lags: &DVector<f64>,
    pair_weights: &DVector<f64>,
    ties: Option<&AbsoluteTies>,
) -> TravelTimeSystem {
    let n = index.items();
    let pair_rows = index.len();
    let extra = ties.map_or(1, |t| t.len());
    let total = pair_rows + extra;

    let mut design = SparseDesign::with_capacity(n, total);
    let mut weights = DVector::zeros(total);
    let mut data = DVector::zeros(total);

    for (k, (i, j)) in index.iter().enumerate() {
        design.push_row(vec![(i, -1.0), (j, 1.0)]);
        weights[k] = pair_weights[k];
        data[k] = lags[k];
    }

    match ties {
        None => {
            design.push_row((0..n).map(|c| (c, 1.0)).collect());
            weights[pair_rows] = zero_sum_weight(pair_weights);
        }
        Some(ties) => {
            for (t, (&item, (&value, &weight))) in ties
                .items
                .iter()
                .zip(ties.values.iter().zip(ties.weights.iter()))
                .enumerate()
            {
                design.push_row(vec![(item, 1.0)]);
                weights[pair_rows + t] = weight;
                data[pair_rows + t] = value;
            }
        }
    }

    TravelTimeSystem {
        design,
        weights,
        data,
        pair_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sum_row_is_appended_without_ties() {
        let index = PairIndex::new(3);
        let sys = build_system(
            &index,
            &DVector::from_row_slice(&[1.0, 2.0, 3.0]),
            &DVector::from_element(3, 1.0),
            None,
        );
        let g = sys.design.to_dense();
        assert_eq!(g.nrows(), 4);
        assert_eq!(g.row(0).iter().copied().collect::<Vec<_>>(), vec![-1.0, 1.0, 0.0]);
        assert_eq!(g.row(2).iter().copied().collect::<Vec<_>>(), vec![0.0, -1.0, 1.0]);
        assert_eq!(g.row(3).iter().copied().collect::<Vec<_>>(), vec![1.0, 1.0, 1.0]);
        assert_eq!(sys.weights[3], 1.0);
        assert_eq!(sys.data[3], 0.0);
    }

    #[test]
    fn zero_sum_weight_follows_pair_weights() {
        assert_eq!(zero_sum_weight(&DVector::from_row_slice(&[2.0, 4.0, 6.0])), 4.0);
        assert_eq!(zero_sum_weight(&DVector::from_element(3, 1e12)), 1e12);
        assert_eq!(zero_sum_weight(&DVector::zeros(3)), 1.0);
    }

    #[test]
    fn ties_replace_zero_sum_row() {
        let index = PairIndex::new(3);
        let ties = AbsoluteTies::new(vec![10.0, 12.0], vec![5.0, 7.0], vec![2, 0]).unwrap();
        let sys = build_system(
            &index,
            &DVector::from_row_slice(&[1.0, 2.0, 3.0]),
            &DVector::from_element(3, 1.0),
            Some(&ties),
        );
        let g = sys.design.to_dense();
        assert_eq!(g.nrows(), 5);
        assert_eq!(g.row(3).iter().copied().collect::<Vec<_>>(), vec![0.0, 0.0, 1.0]);
        assert_eq!(g.row(4).iter().copied().collect::<Vec<_>>(), vec![1.0, 0.0, 0.0]);
        assert_eq!(sys.weights.as_slice(), &[1.0, 1.0, 1.0, 5.0, 7.0]);
        assert_eq!(sys.data.as_slice(), &[1.0, 2.0, 3.0, 10.0, 12.0]);
    }
}
