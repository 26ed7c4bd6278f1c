//! Mathematical utilities: sparse design rows and weighted normal equations.

pub mod normal;

pub use normal::*;
