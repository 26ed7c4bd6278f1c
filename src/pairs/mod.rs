//! Pairwise data model: unique-pair indexing plus compact/grid storage.

pub mod index;
pub mod values;

pub use index::*;
pub use values::*;
