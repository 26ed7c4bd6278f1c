//! `lag-align` library crate.
//!
//! Estimates per-item arrival times from noisy pairwise lags and re-ranks
//! multi-candidate lag measurements against the current estimate.
//!
//! - `pairs`: compact / grid storage of pairwise quantities
//! - `solver`: weighted least-squares travel-time solver
//! - `refine`: polarity-constrained peak refinement
//!
//! The binary (`lagalign`) is a thin wrapper around `app`.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod math;
pub mod pairs;
pub mod refine;
pub mod report;
pub mod solver;
