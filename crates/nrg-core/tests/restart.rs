//! Diagonalizing with `diagratio < 1` lets the backend skip computing the
//! upper part of a subspace's spectrum; if the truncation cut then needs
//! states past what was actually computed, the step must be rerun with a
//! larger `diagratio` until every subspace has enough eigenpairs to trust
//! the cut, converging to the same result a full (`diagratio = 1`) solve
//! would have produced.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use nrg_core::diagonalizer::shared_memory::SharedMemoryDiagonalizer;
use nrg_core::diagonalizer::{DiagTask, Diagonalizer};
use nrg_core::invariant::Invariant;
use nrg_core::spectrum::Spectrum;
use nrg_core::truncator::{self, TruncationPolicy};

fn diagonal_matrix(values: &[f64]) -> DMatrix<f64> {
    let n = values.len();
    let mut h = DMatrix::<f64>::zeros(n, n);
    for (i, &v) in values.iter().enumerate() {
        h[(i, i)] = v;
    }
    h
}

fn tasks(a_values: &[f64], b_values: &[f64]) -> (Invariant, Invariant, Vec<DiagTask<f64>>) {
    let a = Invariant::new(vec![0, 0]);
    let b = Invariant::new(vec![1, 1]);
    (
        a.clone(),
        b.clone(),
        vec![
            DiagTask {
                invariant: a,
                hamiltonian: diagonal_matrix(a_values),
            },
            DiagTask {
                invariant: b,
                hamiltonian: diagonal_matrix(b_values),
            },
        ],
    )
}

#[test]
fn diagratio_restart_converges_to_the_same_ground_state_as_a_full_solve() {
    let a_values: Vec<f64> = (0..20).map(|i| i as f64).collect();
    let b_values: Vec<f64> = (0..11).map(|i| i as f64 + 0.5).collect();
    let backend = SharedMemoryDiagonalizer;

    let (a, b, full_tasks) = tasks(&a_values, &b_values);
    let full = backend.diagonalize_all(full_tasks, 1.0).unwrap();
    let full_gs = full[&a].eigenvalues[0].min(full[&b].eigenvalues[0]);

    let policy = TruncationPolicy {
        n_keep: 4,
        n_keep_min: 0,
        energy_cutoff: None,
        degeneracy_tol: 1e-9,
        n_sg_max: 0,
    };

    let mut diagratio = 0.1_f64;
    let restart_factor = 3.0_f64;
    let max_retries = ((1.0_f64 / diagratio).log2().ceil() as usize) + 1;
    let mut retries = 0usize;
    let mut converged_gs = None;

    loop {
        let (_, _, round_tasks) = tasks(&a_values, &b_values);
        let solved = backend.diagonalize_all(round_tasks, diagratio).unwrap();

        let mut spectra = BTreeMap::new();
        for (invariant, result) in solved {
            let dim = result.eigenvectors.ncols();
            let mut spec = Spectrum::new(result.eigenvalues, result.eigenvectors, dim);
            spec.v_zero = spec.v_orig.clone();
            spectra.insert(invariant, spec);
        }

        let outcome = truncator::truncate(&mut spectra, &policy);
        if outcome.insufficient.is_empty() {
            let gs = spectra
                .values()
                .filter_map(|s| s.v_zero.first().copied())
                .fold(f64::INFINITY, f64::min);
            converged_gs = Some(gs);
            break;
        }

        assert!(
            retries < max_retries,
            "failed to converge within the allotted {max_retries} retries"
        );
        retries += 1;
        diagratio = (diagratio * restart_factor).min(1.0);
    }

    assert!(retries <= max_retries);
    assert!((converged_gs.unwrap() - full_gs).abs() < 1e-12);
}
