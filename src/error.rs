//! Error taxonomy shared by every stage of the alignment pipeline.
//!
//! Each variant maps to a stable process exit code so the binary can report
//! *why* a run failed (malformed input vs. a disconnected pair network).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignError {
    /// Array sizes that cannot describe the same set of items.
    #[error("size mismatch: {0}")]
    Size(String),

    /// Grid not square, or not (anti)symmetric where it must be.
    #[error("inconsistent pair structure: {0}")]
    Structure(String),

    /// A value outside its admissible range.
    #[error("invalid value: {0}")]
    Value(String),

    /// Normal-equations matrix is not invertible, usually because the pair
    /// graph is disconnected.
    #[error("singular system: {0}")]
    Singular(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("output failed: {0}")]
    Io(String),
}

impl AlignError {
    pub fn size(message: impl Into<String>) -> Self {
        Self::Size(message.into())
    }

    pub fn structure(message: impl Into<String>) -> Self {
        Self::Structure(message.into())
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::Value(message.into())
    }

    pub fn singular(message: impl Into<String>) -> Self {
        Self::Singular(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AlignError::Config(_) => 2,
            AlignError::Size(_) => 3,
            AlignError::Structure(_) => 4,
            AlignError::Value(_) => 5,
            AlignError::Singular(_) => 6,
            AlignError::Io(_) => 7,
        }
    }
}

impl From<std::io::Error> for AlignError {
    fn from(err: std::io::Error) -> Self {
        AlignError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AlignError {
    fn from(err: serde_json::Error) -> Self {
        AlignError::Io(err.to_string())
    }
}
