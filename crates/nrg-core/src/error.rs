//! Crate-wide error taxonomy: `CorruptInput`, `InsufficientStates`,
//! `IoFailure`, `ToleranceViolation`, `UnsupportedSymmetry`,
//! `CommunicationFailure`, plus `Serde`/`Bincode` conversions.
//! `InsufficientStates` is retried locally by `Solver`; everything else
//! bubbles to the top.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NrgError {
    #[error("corrupt input: {0}")]
    CorruptInput(String),

    #[error("insufficient states in subspace {invariant:?} at step {step}: computed {computed} < dim {dim}")]
    InsufficientStates {
        invariant: String,
        step: i64,
        computed: usize,
        dim: usize,
    },

    #[error("I/O failure on {path}: {source}")]
    IoFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tolerance violation: {what} was {actual}, expected within {tolerance} of {expected}")]
    ToleranceViolation {
        what: String,
        actual: f64,
        expected: f64,
        tolerance: f64,
    },

    #[error("unsupported symmetry: {0}")]
    UnsupportedSymmetry(String),

    #[error("communication failure: {0}")]
    CommunicationFailure(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("binary codec error: {0}")]
    Bincode(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, NrgError>;

impl NrgError {
    /// Wrap a raw I/O error with the path that was being accessed, per the
    /// "fail-fast, error carries the filename" persistence contract.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        NrgError::IoFailure {
            path: path.into(),
            source,
        }
    }

    pub fn tolerance(what: impl Into<String>, actual: f64, expected: f64, tolerance: f64) -> Self {
        NrgError::ToleranceViolation {
            what: what.into(),
            actual,
            expected,
            tolerance,
        }
    }

    /// `true` for the one error kind `Solver` is allowed to retry locally.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NrgError::InsufficientStates { .. })
    }
}
