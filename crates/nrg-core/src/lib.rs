//! Numerical renormalization group engine: iterative diagonalization and
//! truncation of a discretized Wilson chain, plus the companion
//! density-matrix and spectral-function accumulation pipeline for
//! quantum impurity models.
//!
//! The engine is generic over [`scalar::Scalar`] (real `f64` or complex
//! `num_complex::Complex64`) so real- and complex-Hamiltonian models share
//! one code path, and polymorphic over symmetry via the
//! [`invariant::Symmetry`] capability trait so new symmetries plug in
//! without touching [`matrix_builder`], [`truncator`], or [`recalculator`].

pub mod chain;
pub mod config;
pub mod density_matrix;
pub mod diag_state;
pub mod diagonalizer;
pub mod error;
pub mod input;
pub mod invariant;
pub mod matrix_builder;
pub mod operator;
pub mod output;
pub mod persistence;
pub mod recalculator;
pub mod scalar;
pub mod solver;
pub mod spectral_engine;
pub mod spectrum;
pub mod stats;
pub mod step;
pub mod truncator;
pub mod utils;
pub mod workdir;

pub use error::{NrgError, Result};
