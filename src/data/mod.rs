//! Data sources.
//!
//! - seeded synthetic candidate problems (`synthetic`)

pub mod synthetic;

pub use synthetic::*;
