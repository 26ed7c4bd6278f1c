//! Travel-time solver.
//!
//! Responsibilities:
//!
//! - validate pairwise lags, weights and absolute ties
//! - assemble the sparse weighted design (`design`)
//! - solve through the normal equations and keep the generalized inverse
//!   for covariance propagation (`travel_time`)

pub mod design;
pub mod travel_time;

pub use design::*;
pub use travel_time::*;
