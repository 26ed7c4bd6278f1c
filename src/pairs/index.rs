//! Compact pair indexing.
//!
//! The compact order walks the lower triangle of an N×N grid column by
//! column, row index running fastest:
//!
//! ```text
//! (0,1) (0,2) … (0,N-1) (1,2) … (N-2,N-1)
//! ```
//!
//! Position `k` names the unordered pair `(i_k, j_k)` with `i_k < j_k`; the
//! grid cell that stores it in lower-triangle terms is `(j_k, i_k)`.

use crate::error::AlignError;

/// Number of unique pairs among `items` items.
pub fn pair_count(items: usize) -> usize {
    items * items.saturating_sub(1) / 2
}

/// Recover N from a compact length L (the positive root of N² − N − 2L = 0).
pub fn items_from_pair_count(len: usize) -> Result<usize, AlignError> {
    if len == 0 {
        return Err(AlignError::size("compact pair sequence is empty"));
    }
    let n = ((2 * len) as f64).sqrt().ceil() as usize;
    if pair_count(n) != len {
        return Err(AlignError::size(format!(
            "compact length {len} is not a triangular number N(N-1)/2"
        )));
    }
    Ok(n)
}

/// Parallel row/column index vectors for the compact order of N items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairIndex {
    items: usize,
    first: Vec<usize>,
    second: Vec<usize>,
}

impl PairIndex {
    pub fn new(items: usize) -> Self {
        let len = pair_count(items);
        let mut first = Vec::with_capacity(len);
        let mut second = Vec::with_capacity(len);
        for i in 0..items {
            for j in (i + 1)..items {
                first.push(i);
                second.push(j);
            }
        }
        Self {
            items,
            first,
            second,
        }
    }

    pub fn from_pair_count(len: usize) -> Result<Self, AlignError> {
        items_from_pair_count(len).map(Self::new)
    }

    pub fn items(&self) -> usize {
        self.items
    }

    pub fn len(&self) -> usize {
        self.first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    /// The pair `(i, j)`, `i < j`, stored at compact position `k`.
    pub fn pair(&self, k: usize) -> (usize, usize) {
        (self.first[k], self.second[k])
    }

    /// Lower of the two item indices, per position.
    pub fn first(&self) -> &[usize] {
        &self.first
    }

    /// Higher of the two item indices, per position.
    pub fn second(&self) -> &[usize] {
        &self.second
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.first.iter().copied().zip(self.second.iter().copied())
    }

    /// Compact position of the unordered pair `{a, b}`.
    ///
    /// Returns `None` for `a == b` or out-of-range items.
    pub fn position(&self, a: usize, b: usize) -> Option<usize> {
        if a == b || a >= self.items || b >= self.items {
            return None;
        }
        let (i, j) = if a < b { (a, b) } else { (b, a) };
        Some(i * self.items - i * (i + 1) / 2 + (j - i - 1))
    }
}
