//! Weighted least squares through the normal equations.
//!
//! For a design `G` (M×N) and diagonal weights `W` we form
//!
//! ```text
//! Gg = (Gᵀ W G)⁻¹ Gᵀ W
//! ```
//!
//! so that `x = Gg · d` for any data vector `d`. The design is kept sparse
//! (a list of `(column, coefficient)` entries per row); `GᵀWG` is accumulated
//! directly from those entries and only the N×N normal matrix is dense.
//!
//! The normal matrix is first equilibrated, `A = D⁻½ GᵀWG D⁻½` with `D` its
//! diagonal, so that conditioning does not depend on the overall weight
//! scale. The reciprocal condition number of `A` (smallest / largest singular
//! value) decides whether the system is solvable; a disconnected pair graph
//! shows up as an exact zero singular value. The solve itself is a Cholesky
//! factorization of `A`.

use nalgebra::{DMatrix, DVector};

use crate::error::AlignError;

/// Equilibrated systems with `σ_min / σ_max` at or below this are singular.
pub const RCOND_TOL: f64 = 1e-12;

/// Sparse row-major design matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseDesign {
    cols: usize,
    rows: Vec<Vec<(usize, f64)>>,
}

impl SparseDesign {
    pub fn new(cols: usize) -> Self {
        Self {
            cols,
            rows: Vec::new(),
        }
    }

    pub fn with_capacity(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows: Vec::with_capacity(rows),
        }
    }

    /// Append a row given its non-zero entries.
    pub fn push_row(&mut self, entries: Vec<(usize, f64)>) {
        debug_assert!(entries.iter().all(|&(c, _)| c < self.cols));
        self.rows.push(entries);
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, r: usize) -> &[(usize, f64)] {
        &self.rows[r]
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut g = DMatrix::zeros(self.rows.len(), self.cols);
        for (r, row) in self.rows.iter().enumerate() {
            for &(c, v) in row {
                g[(r, c)] += v;
            }
        }
        g
    }
}

/// Generalized inverse of a weighted system plus its conditioning.
#[derive(Debug, Clone)]
pub struct WeightedInverse {
    /// N×M matrix mapping data to parameters.
    pub ginv: DMatrix<f64>,
    /// Reciprocal condition number of the equilibrated `GᵀWG`.
    pub rcond: f64,
}

/// Build `(GᵀWG)⁻¹GᵀW`.
///
/// Fails with `AlignError::Singular` when the normal matrix is not
/// invertible, and with `AlignError::Size` when weights and rows disagree.
pub fn weighted_inverse(design: &SparseDesign, weights: &DVector<f64>) -> Result<WeightedInverse, AlignError> {
    let m = design.nrows();
    let n = design.ncols();
    if weights.len() != m {
        return Err(AlignError::size(format!(
            "{} weights for {m} design rows",
            weights.len()
        )));
    }
    if n == 0 {
        return Err(AlignError::size("design has no columns"));
    }

    let mut normal = DMatrix::<f64>::zeros(n, n);
    let mut gtw = DMatrix::<f64>::zeros(n, m);
    for r in 0..m {
        let w = weights[r];
        let row = design.row(r);
        for &(a, ca) in row {
            gtw[(a, r)] += w * ca;
            for &(b, cb) in row {
                normal[(a, b)] += w * ca * cb;
            }
        }
    }

    let mut scale = DVector::<f64>::zeros(n);
    for c in 0..n {
        let d = normal[(c, c)];
        if !(d.is_finite() && d > 0.0) {
            return Err(AlignError::singular(format!(
                "column {c} has no weighted observations; is the pair graph disconnected?"
            )));
        }
        scale[c] = 1.0 / d.sqrt();
    }
    let equilibrated = DMatrix::from_fn(n, n, |r, c| normal[(r, c)] * scale[r] * scale[c]);

    let sv = equilibrated.singular_values();
    let s_max = sv.max();
    let s_min = sv.min();
    let rcond = if s_max > 0.0 { s_min / s_max } else { 0.0 };
    if !(rcond.is_finite() && rcond > RCOND_TOL) {
        return Err(AlignError::singular(format!(
            "normal matrix is not invertible (rcond={rcond:.3e}); is the pair graph disconnected?"
        )));
    }

    let chol = equilibrated
        .cholesky()
        .ok_or_else(|| AlignError::singular("normal matrix is not positive definite"))?;
    let rhs = DMatrix::from_fn(n, m, |r, c| gtw[(r, c)] * scale[r]);
    let mut ginv = chol.solve(&rhs);
    for r in 0..n {
        ginv.row_mut(r).scale_mut(scale[r]);
    }
    if !ginv.iter().all(|v| v.is_finite()) {
        return Err(AlignError::singular("generalized inverse has non-finite entries"));
    }

    Ok(WeightedInverse { ginv, rcond })
}

/// Propagate independent observation variances through `Gg`:
/// `Gg · diag(var) · Ggᵀ`.
pub fn propagate_covariance(ginv: &DMatrix<f64>, obs_var: &DVector<f64>) -> Result<DMatrix<f64>, AlignError> {
    if obs_var.len() != ginv.ncols() {
        return Err(AlignError::size(format!(
            "{} observation variances for a {}-column generalized inverse",
            obs_var.len(),
            ginv.ncols()
        )));
    }
    let mut scaled = ginv.clone();
    for (c, &v) in obs_var.iter().enumerate() {
        scaled.column_mut(c).scale_mut(v);
    }
    Ok(&scaled * ginv.transpose())
}
