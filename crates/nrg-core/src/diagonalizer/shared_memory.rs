//! Thread-pool backend: every subspace's block is diagonalized
//! independently, scheduled largest-first so the slowest task starts
//! earliest and the thread pool drains evenly.

use std::collections::BTreeMap;

use nalgebra::linalg::SymmetricEigen;
use rayon::prelude::*;

use super::{DiagResult, DiagTask, Diagonalizer};
use crate::error::Result;
use crate::invariant::Invariant;
use crate::scalar::Scalar;

#[derive(Debug, Default)]
pub struct SharedMemoryDiagonalizer;

impl<T: Scalar> Diagonalizer<T> for SharedMemoryDiagonalizer {
    fn diagonalize_all(
        &self,
        mut tasks: Vec<DiagTask<T>>,
        diagratio: f64,
    ) -> Result<BTreeMap<Invariant, DiagResult<T>>> {
        tasks.sort_by_key(|t| std::cmp::Reverse(t.hamiltonian.nrows()));

        let solved: Vec<(Invariant, DiagResult<T>)> = tasks
            .into_par_iter()
            .map(|task| {
                let dim = task.hamiltonian.nrows();
                let eig = SymmetricEigen::new(task.hamiltonian);
                let mut pairs: Vec<(f64, usize)> = eig
                    .eigenvalues
                    .iter()
                    .enumerate()
                    .map(|(i, &e)| (e, i))
                    .collect();
                pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

                let keep = ((dim as f64 * diagratio).ceil() as usize).clamp(1, dim.max(1));
                pairs.truncate(keep);

                let stored = pairs.len();
                let mut eigenvectors = crate::scalar::Matrix::<T>::zeros(stored, dim);
                let mut eigenvalues = Vec::with_capacity(stored);
                for (row, &(e, src_col)) in pairs.iter().enumerate() {
                    eigenvalues.push(e);
                    for c in 0..dim {
                        eigenvectors[(row, c)] = eig.eigenvectors[(c, src_col)];
                    }
                }

                (
                    task.invariant,
                    DiagResult {
                        eigenvalues,
                        eigenvectors,
                    },
                )
            })
            .collect();

        Ok(solved.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    #[test]
    fn diagonalizes_diagonal_matrix_to_itself() {
        let mut h = DMatrix::<f64>::zeros(2, 2);
        h[(0, 0)] = 3.0;
        h[(1, 1)] = 1.0;
        let tasks = vec![DiagTask {
            invariant: Invariant::new(vec![0, 0]),
            hamiltonian: h,
        }];
        let backend = SharedMemoryDiagonalizer;
        let result = backend.diagonalize_all(tasks, 1.0).unwrap();
        let solved = &result[&Invariant::new(vec![0, 0])];
        assert_eq!(solved.eigenvalues, vec![1.0, 3.0]);
    }

    #[test]
    fn diagratio_below_one_returns_only_the_lowest_fraction_of_eigenpairs() {
        let mut h = DMatrix::<f64>::zeros(4, 4);
        for i in 0..4 {
            h[(i, i)] = i as f64;
        }
        let tasks = vec![DiagTask {
            invariant: Invariant::new(vec![0, 0]),
            hamiltonian: h,
        }];
        let backend = SharedMemoryDiagonalizer;
        let result = backend.diagonalize_all(tasks, 0.5).unwrap();
        let solved = &result[&Invariant::new(vec![0, 0])];
        assert_eq!(solved.eigenvalues, vec![0.0, 1.0]);
        assert_eq!(solved.eigenvectors.ncols(), 4);
    }
}
