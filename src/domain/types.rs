//! Shared domain types.
//!
//! Item indices are 0-based throughout: item `k` of an N-item problem is
//! `0..N`. Per-item vectors (solution, uncertainty, polarity) are indexed the
//! same way.

use serde::{Deserialize, Serialize};

use crate::error::AlignError;

/// Misfit floor (in standard deviations) used when none is given.
pub const DEFAULT_MIN_STD: f64 = 2.0;

/// Items anchored to externally known absolute times.
///
/// Each entry ties `items[k]` to `values[k]` with weight `weights[k]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteTies {
    pub values: Vec<f64>,
    pub weights: Vec<f64>,
    pub items: Vec<usize>,
}

impl AbsoluteTies {
    pub fn new(values: Vec<f64>, weights: Vec<f64>, items: Vec<usize>) -> Result<Self, AlignError> {
        if values.is_empty() {
            return Err(AlignError::size("absolute ties are empty"));
        }
        if values.len() != items.len() || weights.len() != items.len() {
            return Err(AlignError::size(format!(
                "absolute ties have {} values, {} weights and {} items",
                values.len(),
                weights.len(),
                items.len()
            )));
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(AlignError::value(format!("absolute tie value {v} is not finite")));
        }
        if let Some(w) = weights.iter().find(|w| !(w.is_finite() && **w >= 0.0)) {
            return Err(AlignError::value(format!("absolute tie weight {w} must be finite and >= 0")));
        }
        Ok(Self {
            values,
            weights,
            items,
        })
    }

    /// Same weight for every tie.
    pub fn uniform(values: Vec<f64>, weight: f64, items: Vec<usize>) -> Result<Self, AlignError> {
        let weights = vec![weight; values.len()];
        Self::new(values, weights, items)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn check_items(&self, n: usize) -> Result<(), AlignError> {
        match self.items.iter().find(|&&k| k >= n) {
            Some(k) => Err(AlignError::size(format!(
                "absolute tie references item {k} but only {n} items exist"
            ))),
            None => Ok(()),
        }
    }
}

/// Per-item state the refinement engine scores candidates against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemState {
    /// Current time estimate per item.
    pub solution: Vec<f64>,
    /// One standard deviation per item.
    pub uncertainty: Vec<f64>,
    /// Target polarity per item, in {-1, 0, +1}.
    pub polarity: Vec<i8>,
}

impl ItemState {
    pub fn new(solution: Vec<f64>, uncertainty: Vec<f64>, polarity: Vec<i8>) -> Self {
        Self {
            solution,
            uncertainty,
            polarity,
        }
    }

    pub fn items(&self) -> usize {
        self.solution.len()
    }

    /// Check lengths against `n` and value ranges.
    ///
    /// Zero polarity is only admissible when polarity is not enforced.
    pub fn validate(&self, n: usize, force_polarity: bool) -> Result<(), AlignError> {
        for (name, len) in [
            ("solution", self.solution.len()),
            ("uncertainty", self.uncertainty.len()),
            ("polarity", self.polarity.len()),
        ] {
            if len != n {
                return Err(AlignError::size(format!("{name} vector has length {len}, expected {n}")));
            }
        }
        if let Some(s) = self.solution.iter().find(|s| !s.is_finite()) {
            return Err(AlignError::value(format!("solution entry {s} is not finite")));
        }
        if let Some(u) = self.uncertainty.iter().find(|u| !(u.is_finite() && **u >= 0.0)) {
            return Err(AlignError::value(format!("uncertainty {u} must be finite and >= 0")));
        }
        for &p in &self.polarity {
            let ok = match p {
                -1 | 1 => true,
                0 => !force_polarity,
                _ => false,
            };
            if !ok {
                return Err(AlignError::value(format!(
                    "target polarity {p} is not allowed (force_polarity={force_polarity})"
                )));
            }
        }
        Ok(())
    }
}

/// Knobs for one refinement pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefineOptions {
    /// Timing misfit is floored at this many standard deviations.
    pub min_std: f64,
    /// Exclude candidates whose polarity disagrees with the target product.
    pub force_polarity: bool,
    /// Score only; leave the candidate arrays untouched.
    pub diagnostic_only: bool,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            min_std: DEFAULT_MIN_STD,
            force_polarity: true,
            diagnostic_only: false,
        }
    }
}

impl RefineOptions {
    pub fn validate(&self) -> Result<(), AlignError> {
        if !(self.min_std.is_finite() && self.min_std >= 0.0) {
            return Err(AlignError::value(format!("min_std {} must be finite and >= 0", self.min_std)));
        }
        Ok(())
    }
}

/// A pair as seen from one side: the observed lag approximates
/// `solution[row] - solution[col]`.
///
/// Compact position for pair `(i, j)`, `i < j`, is the slot `(j, i)`; a grid
/// contributes both `(r, c)` and `(c, r)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairSlot {
    pub row: usize,
    pub col: usize,
}

/// Which subcommand the pipeline is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Solve,
    Refine,
    Diagnose,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignConfig {
    pub mode: RunMode,

    pub items: usize,
    pub candidates: usize,
    pub seed: u64,
    /// Standard deviation of the timing noise on the correct candidate.
    pub noise: f64,
    /// Spacing of distractor lags (e.g. one signal period).
    pub period: f64,
    /// Probability that rank 1 of a pair holds a distractor.
    pub outlier_prob: f64,
    /// Probability that a distractor carries the wrong polarity.
    pub flip_prob: f64,
    /// Build candidates in grid form instead of compact form.
    pub grid: bool,

    pub min_std: f64,
    pub force_polarity: bool,
    pub iterations: usize,
    /// Independent problems to run, with consecutive seeds.
    pub trials: usize,

    pub json: bool,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Refine,
            items: 8,
            candidates: 3,
            seed: 42,
            noise: 0.01,
            period: 1.0,
            outlier_prob: 0.2,
            flip_prob: 0.5,
            grid: false,
            min_std: DEFAULT_MIN_STD,
            force_polarity: true,
            iterations: 10,
            trials: 1,
            json: false,
        }
    }
}

impl AlignConfig {
    pub fn validate(&self) -> Result<(), AlignError> {
        if self.items < 2 {
            return Err(AlignError::config("at least two items are required"));
        }
        if self.trials == 0 {
            return Err(AlignError::config("at least one trial is required"));
        }
        if self.candidates == 0 {
            return Err(AlignError::config("at least one candidate per pair is required"));
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(AlignError::config("noise must be finite and >= 0"));
        }
        if !(self.period.is_finite() && self.period > 0.0) {
            return Err(AlignError::config("period must be finite and > 0"));
        }
        for (name, p) in [("outlier-prob", self.outlier_prob), ("flip-prob", self.flip_prob)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(AlignError::config(format!("{name} must lie in [0, 1]")));
            }
        }
        if !(self.min_std.is_finite() && self.min_std >= 0.0) {
            return Err(AlignError::config("min-std must be finite and >= 0"));
        }
        Ok(())
    }

    pub fn refine_options(&self) -> RefineOptions {
        RefineOptions {
            min_std: self.min_std,
            force_polarity: self.force_polarity,
            diagnostic_only: self.mode == RunMode::Diagnose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_ties_broadcast_weight() {
        let ties = AbsoluteTies::uniform(vec![1.0, 2.0], 10.0, vec![0, 3]).unwrap();
        assert_eq!(ties.weights, vec![10.0, 10.0]);
        assert!(ties.check_items(4).is_ok());
        assert!(matches!(ties.check_items(3), Err(AlignError::Size(_))));
    }

    #[test]
    fn negative_tie_weight_is_rejected() {
        let err = AbsoluteTies::new(vec![1.0], vec![-1.0], vec![0]).unwrap_err();
        assert!(matches!(err, AlignError::Value(_)));
    }

    #[test]
    fn zero_polarity_needs_force_off() {
        let state = ItemState::new(vec![0.0; 2], vec![0.1; 2], vec![1, 0]);
        assert!(matches!(state.validate(2, true), Err(AlignError::Value(_))));
        assert!(state.validate(2, false).is_ok());
    }

    #[test]
    fn state_length_mismatch_is_size_error() {
        let state = ItemState::new(vec![0.0; 3], vec![0.1; 2], vec![1; 3]);
        assert!(matches!(state.validate(3, true), Err(AlignError::Size(_))));
    }

    #[test]
    fn negative_uncertainty_is_value_error() {
        let state = ItemState::new(vec![0.0; 2], vec![0.1, -0.1], vec![1; 2]);
        assert!(matches!(state.validate(2, true), Err(AlignError::Value(_))));
    }

    #[test]
    fn zero_trials_is_config_error() {
        let config = AlignConfig {
            trials: 0,
            ..AlignConfig::default()
        };
        assert!(matches!(config.validate(), Err(AlignError::Config(_))));
    }

    #[test]
    fn diagnose_mode_sets_diagnostic_flag() {
        let config = AlignConfig {
            mode: RunMode::Diagnose,
            ..AlignConfig::default()
        };
        assert!(config.refine_options().diagnostic_only);
        assert!(!AlignConfig::default().refine_options().diagnostic_only);
    }
}
