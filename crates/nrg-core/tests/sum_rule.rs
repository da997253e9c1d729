//! Recalculating an operator into a trivial one-block basis preserves its
//! weighted Frobenius norm (the discrete analogue of the spectral sum
//! rule), and a full density matrix's trace stays at 1 within the
//! correctness tolerance.

use approx::assert_relative_eq;
use nalgebra::DMatrix;
use nrg_core::diag_state::DiagState;
use nrg_core::invariant::{Invariant, SymmetryKind};
use nrg_core::operator::OperatorBlockSet;
use nrg_core::recalculator::{self, RecalcStrategy};
use nrg_core::spectrum::Spectrum;

#[test]
fn identity_basis_change_preserves_weighted_norm() {
    let sym = SymmetryKind::Qsz.capability();
    let ancestor = Invariant::new(vec![0, 0]);

    let mut old_op: OperatorBlockSet<f64> = OperatorBlockSet::new();
    let block = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 2.0]);
    old_op.insert(ancestor.clone(), ancestor.clone(), block.clone());
    let before = old_op.weighted_frobenius_sum(|_, _| 1.0);

    let mut state: DiagState<f64> = DiagState::new();
    let mut spec = Spectrum::new(vec![0.0, 1.0], DMatrix::<f64>::identity(2, 2), 2);
    spec.v_zero = spec.v_orig.clone();
    spec.split_columns(&[(ancestor.clone(), 2)]);
    state.insert(ancestor.clone(), spec);

    let recalculated = recalculator::recalculate(&old_op, &state, sym.as_ref(), RecalcStrategy::All);
    let after = recalculated.weighted_frobenius_sum(|_, _| 1.0);

    assert_relative_eq!(before, after, epsilon = 1e-9);
}

#[test]
fn boltzmann_density_matrix_trace_is_one() {
    use nrg_core::density_matrix::{boltzmann_density_matrix, DensityMatrixEngine};

    let sym = SymmetryKind::Qsz.capability();
    let mut state: DiagState<f64> = DiagState::new();
    for (q, sz, energies) in [
        (0, 0, vec![0.0, 1.0]),
        (1, 1, vec![0.3, 1.2]),
        (-1, -1, vec![0.3, 1.2]),
    ] {
        let n = energies.len();
        let mut spec = Spectrum::new(energies, DMatrix::<f64>::identity(n, n), n);
        spec.v_zero = spec.v_orig.clone();
        state.insert(Invariant::new(vec![q, sz]), spec);
    }

    let (weights, z) = boltzmann_density_matrix(&state, sym.as_ref(), 0.5);
    let engine = DensityMatrixEngine::new(false);
    let rho = engine.seed_last_shell(&state, &weights, z);

    assert_relative_eq!(rho.trace(sym.as_ref()), 1.0, epsilon = 1e-8);
}
