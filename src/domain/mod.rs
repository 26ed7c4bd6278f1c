//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - per-item inputs to refinement (`ItemState`)
//! - absolute-time anchors for the solver (`AbsoluteTies`)
//! - refinement knobs (`RefineOptions`) and pair addressing (`PairSlot`)
//! - run configuration (`AlignConfig`)

pub mod types;

pub use types::*;
