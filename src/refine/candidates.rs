//! Ranked multi-candidate measurements per pair.
//!
//! A `CandidateSet` bundles correlation, lag and polarity arrays that share a
//! representation, an item count and a candidate count `P`. Rank 0 is the
//! primary candidate the solver consumes.
//!
//! Compact sets may also carry adjacent samples: for each rank an `L × S`
//! matrix of samples taken around the measured peak. They travel with their
//! candidate when ranks are swapped.

use nalgebra::DMatrix;

use crate::domain::PairSlot;
use crate::error::AlignError;
use crate::pairs::{PairIndex, PairValues, Symmetry};

/// One (correlation, lag, polarity) measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub correlation: f64,
    pub lag: f64,
    pub polarity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSet {
    correlation: PairValues,
    lag: PairValues,
    polarity: PairValues,
    adjacent: Option<Vec<DMatrix<f64>>>,
    index: PairIndex,
}

impl CandidateSet {
    /// Validate shapes, symmetry and value ranges.
    pub fn new(correlation: PairValues, lag: PairValues, polarity: PairValues) -> Result<Self, AlignError> {
        if correlation.is_grid() != lag.is_grid() || polarity.is_grid() != lag.is_grid() {
            return Err(AlignError::structure(
                "correlation, lag and polarity must share one representation",
            ));
        }
        let n = lag.items();
        let p = lag.candidates();
        for (name, values) in [("correlation", &correlation), ("polarity", &polarity)] {
            if values.items() != n {
                return Err(AlignError::size(format!(
                    "{name} describes {} items but lag describes {n}",
                    values.items()
                )));
            }
            if values.candidates() != p {
                return Err(AlignError::size(format!(
                    "{name} has {} candidates but lag has {p}",
                    values.candidates()
                )));
            }
        }

        lag.validate(Symmetry::Antisymmetric)?;
        correlation.validate(Symmetry::Symmetric)?;
        polarity.validate(Symmetry::Symmetric)?;

        if let Some(v) = lag.values().into_iter().find(|v| !v.is_finite()) {
            return Err(AlignError::value(format!("candidate lag {v} is not finite")));
        }
        if let Some(v) = correlation
            .values()
            .into_iter()
            .find(|v| !(v.is_finite() && (-1.0..=1.0).contains(v)))
        {
            return Err(AlignError::value(format!("correlation {v} is outside [-1, 1]")));
        }
        if let Some(v) = polarity
            .values()
            .into_iter()
            .find(|v| !(*v == -1.0 || *v == 0.0 || *v == 1.0))
        {
            return Err(AlignError::value(format!("candidate polarity {v} is not -1, 0 or +1")));
        }

        Ok(Self {
            correlation,
            lag,
            polarity,
            adjacent: None,
            index: PairIndex::new(n),
        })
    }

    /// Attach adjacent samples (compact sets only), one `L × S` matrix per rank.
    pub fn with_adjacent(mut self, adjacent: Vec<DMatrix<f64>>) -> Result<Self, AlignError> {
        if self.is_grid() {
            return Err(AlignError::structure("adjacent samples require compact candidates"));
        }
        if adjacent.len() != self.candidates() {
            return Err(AlignError::size(format!(
                "{} adjacent-sample blocks for {} candidates",
                adjacent.len(),
                self.candidates()
            )));
        }
        let width = adjacent[0].ncols();
        for (p, block) in adjacent.iter().enumerate() {
            if block.nrows() != self.index.len() || block.ncols() != width {
                return Err(AlignError::size(format!(
                    "adjacent block {p} is {}x{}, expected {}x{width}",
                    block.nrows(),
                    block.ncols(),
                    self.index.len()
                )));
            }
        }
        self.adjacent = Some(adjacent);
        Ok(self)
    }

    pub fn items(&self) -> usize {
        self.lag.items()
    }

    pub fn candidates(&self) -> usize {
        self.lag.candidates()
    }

    pub fn is_grid(&self) -> bool {
        self.lag.is_grid()
    }

    pub fn correlation(&self) -> &PairValues {
        &self.correlation
    }

    /// Candidate lags; rank 0 is what the solver consumes.
    pub fn lag(&self) -> &PairValues {
        &self.lag
    }

    pub fn polarity(&self) -> &PairValues {
        &self.polarity
    }

    pub fn adjacent(&self) -> Option<&[DMatrix<f64>]> {
        self.adjacent.as_deref()
    }

    /// Every scored slot: one per compact position, or every off-diagonal
    /// grid cell (column-major).
    pub fn slots(&self) -> Vec<PairSlot> {
        if self.is_grid() {
            let n = self.items();
            let mut out = Vec::with_capacity(n * (n - 1));
            for col in 0..n {
                for row in 0..n {
                    if row != col {
                        out.push(PairSlot { row, col });
                    }
                }
            }
            out
        } else {
            self.index.iter().map(|(i, j)| PairSlot { row: j, col: i }).collect()
        }
    }

    /// Candidate at `rank` as seen from `slot` (lag ≈ `s[row] - s[col]`).
    pub fn get(&self, slot: PairSlot, rank: usize) -> Candidate {
        Candidate {
            correlation: self.correlation.directed(slot.row, slot.col, rank, Symmetry::Symmetric),
            lag: self.lag.directed(slot.row, slot.col, rank, Symmetry::Antisymmetric),
            polarity: self.polarity.directed(slot.row, slot.col, rank, Symmetry::Symmetric),
        }
    }

    /// Exchange ranks `a` and `b` at `slot`.
    ///
    /// Compact storage swaps the whole pair (and its adjacent samples); grid
    /// storage swaps the addressed cell only.
    pub fn swap(&mut self, slot: PairSlot, a: usize, b: usize) {
        if a == b {
            return;
        }
        if self.is_grid() {
            for values in [&mut self.correlation, &mut self.lag, &mut self.polarity] {
                if let PairValues::Grid(g) = values {
                    g.swap_ranks(slot.row, slot.col, a, b);
                }
            }
            return;
        }

        let Some(k) = self.index.position(slot.row, slot.col) else {
            return;
        };
        for values in [&mut self.correlation, &mut self.lag, &mut self.polarity] {
            if let PairValues::Compact(c) = values {
                c.swap_ranks(k, a, b);
            }
        }
        if let Some(blocks) = self.adjacent.as_mut() {
            for s in 0..blocks[a].ncols() {
                let va = blocks[a][(k, s)];
                blocks[a][(k, s)] = blocks[b][(k, s)];
                blocks[b][(k, s)] = va;
            }
        }
    }

    /// Convert every array to grid form. Adjacent samples are dropped.
    pub fn into_grid(self) -> Result<Self, AlignError> {
        Self::new(
            PairValues::Grid(self.correlation.to_grid(Symmetry::Symmetric)),
            PairValues::Grid(self.lag.to_grid(Symmetry::Antisymmetric)),
            PairValues::Grid(self.polarity.to_grid(Symmetry::Symmetric)),
        )
    }

    /// Convert every array to compact form.
    pub fn into_compact(self) -> Result<Self, AlignError> {
        let adjacent = self.adjacent.clone();
        let set = Self::new(
            PairValues::Compact(self.correlation.to_compact()),
            PairValues::Compact(self.lag.to_compact()),
            PairValues::Compact(self.polarity.to_compact()),
        )?;
        match adjacent {
            Some(blocks) => set.with_adjacent(blocks),
            None => Ok(set),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairs::CompactPairs;

    fn compact(ranks: &[Vec<f64>]) -> PairValues {
        PairValues::Compact(CompactPairs::from_ranks(ranks).unwrap())
    }

    fn three_item_set() -> CandidateSet {
        CandidateSet::new(
            compact(&[vec![0.9, 0.8, 0.7], vec![0.5, 0.4, 0.3]]),
            compact(&[vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]]),
            compact(&[vec![1.0, 1.0, -1.0], vec![-1.0, -1.0, 1.0]]),
        )
        .unwrap()
    }

    #[test]
    fn correlation_out_of_range_is_value_error() {
        let err = CandidateSet::new(
            compact(&[vec![0.9, 1.2, 0.7]]),
            compact(&[vec![1.0, 2.0, 3.0]]),
            compact(&[vec![1.0, 1.0, 1.0]]),
        )
        .unwrap_err();
        assert!(matches!(err, AlignError::Value(_)));
    }

    #[test]
    fn polarity_must_be_sign() {
        let err = CandidateSet::new(
            compact(&[vec![0.9, 0.8, 0.7]]),
            compact(&[vec![1.0, 2.0, 3.0]]),
            compact(&[vec![1.0, 0.5, 1.0]]),
        )
        .unwrap_err();
        assert!(matches!(err, AlignError::Value(_)));
    }

    #[test]
    fn candidate_count_mismatch_is_size_error() {
        let err = CandidateSet::new(
            compact(&[vec![0.9, 0.8, 0.7]]),
            compact(&[vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0]]),
            compact(&[vec![1.0, 1.0, 1.0]]),
        )
        .unwrap_err();
        assert!(matches!(err, AlignError::Size(_)));
    }

    #[test]
    fn mixed_representations_are_rejected() {
        let lag = compact(&[vec![1.0, 2.0, 3.0]]);
        let corr = PairValues::Grid(compact(&[vec![0.9, 0.8, 0.7]]).to_grid(Symmetry::Symmetric));
        let err = CandidateSet::new(corr, lag, compact(&[vec![1.0, 1.0, 1.0]])).unwrap_err();
        assert!(matches!(err, AlignError::Structure(_)));
    }

    #[test]
    fn compact_swap_moves_whole_triple() {
        let mut set = three_item_set();
        let slot = PairSlot { row: 2, col: 0 };
        set.swap(slot, 0, 1);
        let top = set.get(slot, 0);
        assert_eq!(top, Candidate { correlation: 0.4, lag: -2.0, polarity: -1.0 });
        let other = set.get(PairSlot { row: 1, col: 0 }, 0);
        assert_eq!(other.lag, 1.0);
    }

    #[test]
    fn adjacent_samples_follow_their_candidate() {
        let blocks = vec![
            DMatrix::from_row_slice(3, 2, &[1.0, 1.5, 2.0, 2.5, 3.0, 3.5]),
            DMatrix::from_row_slice(3, 2, &[-1.0, -1.5, -2.0, -2.5, -3.0, -3.5]),
        ];
        let mut set = three_item_set().with_adjacent(blocks).unwrap();
        set.swap(PairSlot { row: 2, col: 1 }, 0, 1);
        let adj = set.adjacent().unwrap();
        assert_eq!(adj[0][(2, 0)], -3.0);
        assert_eq!(adj[1][(2, 1)], 3.5);
        assert_eq!(adj[0][(0, 0)], 1.0);
    }

    #[test]
    fn adjacent_samples_need_matching_rows() {
        let err = three_item_set()
            .with_adjacent(vec![DMatrix::zeros(2, 1), DMatrix::zeros(2, 1)])
            .unwrap_err();
        assert!(matches!(err, AlignError::Size(_)));
    }

    #[test]
    fn grid_slots_see_mirrored_lag() {
        let set = three_item_set().into_grid().unwrap();
        assert_eq!(set.slots().len(), 6);
        let down = set.get(PairSlot { row: 1, col: 0 }, 0);
        let up = set.get(PairSlot { row: 0, col: 1 }, 0);
        assert_eq!(down.lag, -up.lag);
        assert_eq!(down.correlation, up.correlation);
        assert_eq!(down.polarity, up.polarity);
    }
}
