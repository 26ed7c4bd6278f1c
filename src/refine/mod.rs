//! Peak refinement.
//!
//! Responsibilities:
//!
//! - hold ranked (correlation, lag, polarity) candidates per pair (`candidates`)
//! - score candidates against the current solution (`score`)
//! - promote the best eligible candidate to rank 0 (`engine`)

pub mod candidates;
pub mod engine;
pub mod score;

pub use candidates::*;
pub use engine::*;
pub use score::*;
