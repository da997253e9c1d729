//! Diagonalization backends: dense Hermitian eigendecomposition of every
//! subspace's block Hamiltonian at a step, with the actual parallel
//! scheduling pluggable behind the [`Diagonalizer`] trait.

pub mod shared_memory;
#[cfg(feature = "mpi-backend")]
pub mod distributed;

use std::collections::BTreeMap;

use crate::error::Result;
use crate::invariant::Invariant;
use crate::scalar::{Matrix, Scalar};

/// One subspace's unsolved block, paired with the invariant that names it.
pub struct DiagTask<T: Scalar> {
    pub invariant: Invariant,
    pub hamiltonian: Matrix<T>,
}

/// One subspace's solution: ascending eigenvalues and the matching
/// eigenvector matrix (`rows = eigenpairs`, to match `Spectrum`'s layout).
pub struct DiagResult<T: Scalar> {
    pub eigenvalues: Vec<f64>,
    pub eigenvectors: Matrix<T>,
}

/// Solves a batch of independent Hermitian eigenproblems, one per
/// invariant subspace. Implementations may run them across threads
/// (`shared_memory`) or across MPI ranks (`distributed`); callers only
/// depend on this trait so the backend is a pure configuration choice.
///
/// `diagratio` in `(0, 1]` asks the backend to only compute the lowest
/// fraction of each subspace's spectrum (`ceil(dim * diagratio)`
/// eigenpairs) rather than the full dense solve — cheaper, but the caller
/// must be prepared to rerun with a larger `diagratio` if the truncation
/// cut ends up needing states past what was computed.
pub trait Diagonalizer<T: Scalar> {
    fn diagonalize_all(
        &self,
        tasks: Vec<DiagTask<T>>,
        diagratio: f64,
    ) -> Result<BTreeMap<Invariant, DiagResult<T>>>;
}
