//! Pairwise quantities in compact and grid form.
//!
//! Both forms carry a trailing candidate-rank dimension `P >= 1`:
//!
//! - `CompactPairs` is an `L × P` matrix, row `k` being compact position `k`.
//! - `GridPairs` is a stack of `P` square `N × N` grids.
//!
//! Grid cell `(r, c)` holds the value "as seen from `r` towards `c`". For a
//! lag this is `t_r - t_c`, so lags are antisymmetric; correlations, weights
//! and polarities are symmetric. Compact position `k` for pair `(i, j)`,
//! `i < j`, maps to the lower-triangle cell `(j, i)`.

use nalgebra::{DMatrix, DVector};

use crate::error::AlignError;
use crate::pairs::index::{PairIndex, items_from_pair_count, pair_count};

/// How the two halves of a grid relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symmetry {
    /// `grid(i, j) == grid(j, i)` (correlation, weight, polarity).
    Symmetric,
    /// `grid(i, j) == -grid(j, i)` (lag).
    Antisymmetric,
}

impl Symmetry {
    /// Value expected in the mirror cell.
    pub fn mirror(self, value: f64) -> f64 {
        match self {
            Symmetry::Symmetric => value,
            Symmetry::Antisymmetric => -value,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Symmetry::Symmetric => "symmetric",
            Symmetry::Antisymmetric => "antisymmetric",
        }
    }
}

/// Unique-pair sequence, one row per pair and one column per candidate rank.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactPairs {
    items: usize,
    values: DMatrix<f64>,
}

impl CompactPairs {
    /// Wrap an `L × P` matrix. `L` must be triangular.
    pub fn new(values: DMatrix<f64>) -> Result<Self, AlignError> {
        if values.ncols() == 0 {
            return Err(AlignError::size("compact pairs need at least one candidate column"));
        }
        let items = items_from_pair_count(values.nrows())?;
        Ok(Self { items, values })
    }

    /// Single-candidate sequence.
    pub fn from_slice(values: &[f64]) -> Result<Self, AlignError> {
        Self::new(DMatrix::from_column_slice(values.len(), 1, values))
    }

    /// One slice per candidate rank, all of the same triangular length.
    pub fn from_ranks(ranks: &[Vec<f64>]) -> Result<Self, AlignError> {
        let Some(first) = ranks.first() else {
            return Err(AlignError::size("compact pairs need at least one candidate column"));
        };
        let len = first.len();
        if let Some(bad) = ranks.iter().position(|r| r.len() != len) {
            return Err(AlignError::size(format!(
                "candidate rank {bad} has {} pairs, expected {len}",
                ranks[bad].len()
            )));
        }
        let values = DMatrix::from_fn(len, ranks.len(), |k, p| ranks[p][k]);
        Self::new(values)
    }

    /// All-`value` sequence for `items` items and `candidates` ranks.
    pub fn filled(items: usize, candidates: usize, value: f64) -> Result<Self, AlignError> {
        Self::new(DMatrix::from_element(pair_count(items), candidates, value))
    }

    pub fn items(&self) -> usize {
        self.items
    }

    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    pub fn candidates(&self) -> usize {
        self.values.ncols()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn get(&self, k: usize, rank: usize) -> f64 {
        self.values[(k, rank)]
    }

    pub fn set(&mut self, k: usize, rank: usize, value: f64) {
        self.values[(k, rank)] = value;
    }

    /// Exchange two candidate ranks at compact position `k`.
    pub fn swap_ranks(&mut self, k: usize, a: usize, b: usize) {
        self.values.swap((k, a), (k, b));
    }

    /// Values of one candidate rank, in compact order.
    pub fn rank(&self, rank: usize) -> DVector<f64> {
        self.values.column(rank).into_owned()
    }

    pub fn index(&self) -> PairIndex {
        PairIndex::new(self.items)
    }

    /// Expand into grid form, mirroring each value with `symmetry`.
    pub fn to_grid(&self, symmetry: Symmetry) -> GridPairs {
        let n = self.items;
        let index = self.index();
        let grids = (0..self.candidates())
            .map(|p| {
                let mut grid = DMatrix::zeros(n, n);
                for (k, (i, j)) in index.iter().enumerate() {
                    let v = self.values[(k, p)];
                    grid[(j, i)] = v;
                    grid[(i, j)] = symmetry.mirror(v);
                }
                grid
            })
            .collect();
        GridPairs { items: n, grids }
    }
}

/// Redundant `N × N` form, one grid per candidate rank.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPairs {
    items: usize,
    grids: Vec<DMatrix<f64>>,
}

impl GridPairs {
    /// Stack of square grids sharing one side length.
    pub fn new(grids: Vec<DMatrix<f64>>) -> Result<Self, AlignError> {
        let Some(first) = grids.first() else {
            return Err(AlignError::size("grid pairs need at least one candidate grid"));
        };
        let items = first.nrows();
        for (p, grid) in grids.iter().enumerate() {
            if !grid.is_square() {
                return Err(AlignError::structure(format!(
                    "candidate grid {p} is {}x{}, expected square",
                    grid.nrows(),
                    grid.ncols()
                )));
            }
            if grid.nrows() != items {
                return Err(AlignError::size(format!(
                    "candidate grid {p} has side {}, expected {items}",
                    grid.nrows()
                )));
            }
        }
        if items < 2 {
            return Err(AlignError::size("grid pairs need at least two items"));
        }
        Ok(Self { items, grids })
    }

    pub fn from_grid(grid: DMatrix<f64>) -> Result<Self, AlignError> {
        Self::new(vec![grid])
    }

    pub fn items(&self) -> usize {
        self.items
    }

    pub fn candidates(&self) -> usize {
        self.grids.len()
    }

    pub fn grid(&self, rank: usize) -> &DMatrix<f64> {
        &self.grids[rank]
    }

    pub fn get(&self, row: usize, col: usize, rank: usize) -> f64 {
        self.grids[rank][(row, col)]
    }

    /// Exchange two candidate ranks in cell `(row, col)` only.
    pub fn swap_ranks(&mut self, row: usize, col: usize, a: usize, b: usize) {
        if a == b {
            return;
        }
        let va = self.grids[a][(row, col)];
        self.grids[a][(row, col)] = self.grids[b][(row, col)];
        self.grids[b][(row, col)] = va;
    }

    /// Check every grid against its transpose (negated when antisymmetric).
    ///
    /// The diagonal is ignored.
    pub fn validate(&self, symmetry: Symmetry) -> Result<(), AlignError> {
        for (p, grid) in self.grids.iter().enumerate() {
            let transposed = grid.transpose();
            for r in 0..self.items {
                for c in (r + 1)..self.items {
                    if grid[(r, c)] != symmetry.mirror(transposed[(r, c)]) {
                        return Err(AlignError::structure(format!(
                            "candidate grid {p} is not {} at cell ({r}, {c})",
                            symmetry.label()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Collapse to compact form by reading the lower triangle.
    pub fn to_compact(&self) -> CompactPairs {
        let index = PairIndex::new(self.items);
        let values = DMatrix::from_fn(index.len(), self.candidates(), |k, p| {
            let (i, j) = index.pair(k);
            self.grids[p][(j, i)]
        });
        CompactPairs {
            items: self.items,
            values,
        }
    }
}

/// A pairwise quantity in either representation.
#[derive(Debug, Clone, PartialEq)]
pub enum PairValues {
    Compact(CompactPairs),
    Grid(GridPairs),
}

impl PairValues {
    /// Classify an untyped single-candidate matrix by shape.
    ///
    /// A single column (that is not itself a 1×1 grid) is compact; anything
    /// else must be a square grid.
    pub fn detect(matrix: DMatrix<f64>) -> Result<Self, AlignError> {
        if matrix.ncols() == 1 && matrix.nrows() != 1 {
            return CompactPairs::new(matrix).map(PairValues::Compact);
        }
        if !matrix.is_square() {
            return Err(AlignError::structure(format!(
                "{}x{} array is neither a compact column nor a square grid",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        GridPairs::from_grid(matrix).map(PairValues::Grid)
    }

    pub fn compact(values: &[f64]) -> Result<Self, AlignError> {
        CompactPairs::from_slice(values).map(PairValues::Compact)
    }

    pub fn items(&self) -> usize {
        match self {
            PairValues::Compact(c) => c.items(),
            PairValues::Grid(g) => g.items(),
        }
    }

    pub fn candidates(&self) -> usize {
        match self {
            PairValues::Compact(c) => c.candidates(),
            PairValues::Grid(g) => g.candidates(),
        }
    }

    pub fn is_grid(&self) -> bool {
        matches!(self, PairValues::Grid(_))
    }

    /// Structural check; compact form is always consistent by construction.
    pub fn validate(&self, symmetry: Symmetry) -> Result<(), AlignError> {
        match self {
            PairValues::Compact(_) => Ok(()),
            PairValues::Grid(g) => g.validate(symmetry),
        }
    }

    pub fn to_compact(&self) -> CompactPairs {
        match self {
            PairValues::Compact(c) => c.clone(),
            PairValues::Grid(g) => g.to_compact(),
        }
    }

    pub fn to_grid(&self, symmetry: Symmetry) -> GridPairs {
        match self {
            PairValues::Compact(c) => c.to_grid(symmetry),
            PairValues::Grid(g) => g.clone(),
        }
    }

    /// Value for the directed pair `(row, col)`, `row != col`.
    ///
    /// Compact storage holds the lower-triangle cell; the upper one is its
    /// mirror under `symmetry`.
    pub fn directed(&self, row: usize, col: usize, rank: usize, symmetry: Symmetry) -> f64 {
        match self {
            PairValues::Grid(g) => g.get(row, col, rank),
            PairValues::Compact(c) => {
                let (lo, hi) = if row < col { (row, col) } else { (col, row) };
                let k = lo * c.items() - lo * (lo + 1) / 2 + (hi - lo - 1);
                let v = c.get(k, rank);
                if row > col { v } else { symmetry.mirror(v) }
            }
        }
    }

    /// Every stored off-diagonal value, for range checks.
    pub fn values(&self) -> Vec<f64> {
        match self {
            PairValues::Compact(c) => c.matrix().iter().copied().collect(),
            PairValues::Grid(g) => {
                let n = g.items();
                let mut out = Vec::with_capacity(n * n * g.candidates());
                for p in 0..g.candidates() {
                    for c in 0..n {
                        for r in 0..n {
                            if r != c {
                                out.push(g.get(r, c, p));
                            }
                        }
                    }
                }
                out
            }
        }
    }
}

impl From<CompactPairs> for PairValues {
    fn from(value: CompactPairs) -> Self {
        PairValues::Compact(value)
    }
}

impl From<GridPairs> for PairValues {
    fn from(value: GridPairs) -> Self {
        PairValues::Grid(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lags_from_times(t: &[f64]) -> CompactPairs {
        let idx = PairIndex::new(t.len());
        let lags: Vec<f64> = idx.iter().map(|(i, j)| t[j] - t[i]).collect();
        CompactPairs::from_slice(&lags).unwrap()
    }

    #[test]
    fn compact_grid_round_trip_is_exact() {
        let values = CompactPairs::from_ranks(&[
            vec![0.1, -2.5, 3.25, 7.0, -0.0625, 1e-9],
            vec![9.0, 8.0, 7.0, 6.0, 5.0, 4.0],
        ])
        .unwrap();
        for symmetry in [Symmetry::Symmetric, Symmetry::Antisymmetric] {
            let grid = values.to_grid(symmetry);
            grid.validate(symmetry).unwrap();
            assert_eq!(grid.to_compact(), values);
        }
    }

    #[test]
    fn grid_cell_holds_row_minus_col_for_lags() {
        let t = [0.0, 2.0, 5.0, 9.0];
        let grid = lags_from_times(&t).to_grid(Symmetry::Antisymmetric);
        for r in 0..4 {
            for c in 0..4 {
                if r != c {
                    assert_eq!(grid.get(r, c, 0), t[r] - t[c]);
                }
            }
        }
    }

    #[test]
    fn asymmetric_grid_is_rejected() {
        let mut grid = DMatrix::from_element(3, 3, 0.5);
        grid[(0, 2)] = 0.4;
        let g = GridPairs::from_grid(grid).unwrap();
        assert!(matches!(g.validate(Symmetry::Symmetric), Err(AlignError::Structure(_))));
        assert!(matches!(g.validate(Symmetry::Antisymmetric), Err(AlignError::Structure(_))));
    }

    #[test]
    fn non_square_grid_is_structure_error() {
        let err = GridPairs::from_grid(DMatrix::zeros(3, 4)).unwrap_err();
        assert!(matches!(err, AlignError::Structure(_)));
    }

    #[test]
    fn mismatched_grid_sides_are_size_error() {
        let err = GridPairs::new(vec![DMatrix::zeros(3, 3), DMatrix::zeros(4, 4)]).unwrap_err();
        assert!(matches!(err, AlignError::Size(_)));
    }

    #[test]
    fn detect_dispatches_on_shape() {
        let compact = PairValues::detect(DMatrix::from_column_slice(6, 1, &[1.0; 6])).unwrap();
        assert!(matches!(compact, PairValues::Compact(_)));
        assert_eq!(compact.items(), 4);

        let grid = PairValues::detect(DMatrix::zeros(4, 4)).unwrap();
        assert!(grid.is_grid());

        let bad = PairValues::detect(DMatrix::from_column_slice(5, 1, &[1.0; 5])).unwrap_err();
        assert!(matches!(bad, AlignError::Size(_)));

        let bad = PairValues::detect(DMatrix::zeros(2, 3)).unwrap_err();
        assert!(matches!(bad, AlignError::Structure(_)));
    }

    #[test]
    fn directed_lookup_agrees_between_forms() {
        let compact = PairValues::Compact(lags_from_times(&[1.0, -3.0, 4.5, 0.25, 2.0]));
        let grid = PairValues::Grid(compact.to_grid(Symmetry::Antisymmetric));
        for r in 0..5 {
            for c in 0..5 {
                if r != c {
                    assert_eq!(
                        compact.directed(r, c, 0, Symmetry::Antisymmetric),
                        grid.directed(r, c, 0, Symmetry::Antisymmetric)
                    );
                }
            }
        }
    }

    #[test]
    fn ranks_of_unequal_length_are_rejected() {
        let err = CompactPairs::from_ranks(&[vec![1.0; 3], vec![1.0; 6]]).unwrap_err();
        assert!(matches!(err, AlignError::Size(_)));
    }
}
