//! Reduced density matrix construction: the standard (last-shell-only)
//! density matrix used by the FT/DM-NRG accumulators, and the full
//! density matrix (FDM) built by summing a weighted contribution from
//! every shell's discarded states.

use std::collections::BTreeMap;

use crate::diag_state::DiagState;
use crate::invariant::{Invariant, Symmetry};
use crate::scalar::{Matrix, Scalar};
use crate::stats::ExtFloat;

/// `rho[I] = diag(exp(-v_zero[I] / scT)) / Z`, one diagonal block per
/// subspace, at the chain's last iteration.
pub fn boltzmann_density_matrix<T: Scalar>(
    state: &DiagState<T>,
    symmetry: &dyn Symmetry,
    sc_t: f64,
) -> (BTreeMap<Invariant, Vec<f64>>, f64) {
    let mut weights = BTreeMap::new();
    let mut z = 0.0f64;
    for (invariant, spec) in &state.spectra {
        let mult = symmetry.multiplicity(invariant) as f64;
        let w: Vec<f64> = spec.v_zero.iter().map(|&e| (-e / sc_t).exp()).collect();
        z += mult * w.iter().sum::<f64>();
        weights.insert(invariant.clone(), w);
    }
    (weights, z)
}

/// One shell's density matrix, stored as a diagonal-weight vector per
/// subspace (the last, un-truncated shell) or a dense block (after
/// backward reduction mixes states across ancestor contributions).
#[derive(Clone, Debug, Default)]
pub struct DensityMatrixSet<T: Scalar> {
    pub blocks: BTreeMap<Invariant, Matrix<T>>,
}

impl<T: Scalar> DensityMatrixSet<T> {
    pub fn new() -> Self {
        DensityMatrixSet {
            blocks: BTreeMap::new(),
        }
    }

    pub fn trace(&self, symmetry: &dyn Symmetry) -> f64 {
        self.blocks
            .iter()
            .map(|(invariant, m)| {
                let mult = symmetry.multiplicity(invariant) as f64;
                let diag_sum: f64 = (0..m.nrows().min(m.ncols()))
                    .map(|i| m[(i, i)].real())
                    .sum();
                mult * diag_sum
            })
            .sum()
    }
}

/// The shell-local contribution that never propagates further down the
/// chain: the rows of a child shell's density matrix beyond `kept`, which
/// FDM folds into the running full density matrix instead of discarding.
fn discarded_block<T: Scalar>(
    child_state: &DiagState<T>,
    child_rho: &DensityMatrixSet<T>,
) -> DensityMatrixSet<T> {
    let mut out = DensityMatrixSet::new();
    for (invariant, spec) in &child_state.spectra {
        let Some(rho) = child_rho.blocks.get(invariant) else {
            continue;
        };
        let stored = spec.stored().min(rho.nrows()).min(rho.ncols());
        let kept = spec.kept.min(stored);
        if kept >= stored {
            continue;
        }
        let block = rho.view((kept, kept), (stored - kept, stored - kept)).into_owned();
        out.blocks.insert(invariant.clone(), block);
    }
    out
}

/// Backward-recursion engine: starting from the last shell's Boltzmann
/// density matrix, propagates `rho` one step back toward the impurity by
/// embedding each subspace's reduced density matrix into its ancestors'
/// bases. When `fdm` is set, it additionally peels off each shell's
/// discarded-state block (the part that will never propagate further) and
/// folds it, weighted by that shell's extended-precision weight, into a
/// running full density matrix.
pub struct DensityMatrixEngine {
    pub fdm: bool,
}

impl DensityMatrixEngine {
    pub fn new(fdm: bool) -> Self {
        DensityMatrixEngine { fdm }
    }

    /// Initializes the last shell's density matrix from Boltzmann weights.
    /// When `fdm` is set, every state at the last shell is itself
    /// "discarded" (there is nowhere further to propagate), so the FDM
    /// running accumulator is seeded with a copy of the same matrix.
    pub fn seed_last_shell<T: Scalar>(
        &self,
        state: &DiagState<T>,
        weights: &BTreeMap<Invariant, Vec<f64>>,
        z: f64,
    ) -> (DensityMatrixSet<T>, Option<DensityMatrixSet<T>>) {
        let mut out = DensityMatrixSet::new();
        for (invariant, w) in weights {
            let stored = state.spectra[invariant].stored();
            let mut m = Matrix::<T>::zeros(stored, stored);
            for i in 0..stored {
                m[(i, i)] = T::from_real(w[i] / z);
            }
            out.blocks.insert(invariant.clone(), m);
        }
        let fdm_seed = if self.fdm { Some(out.clone()) } else { None };
        (out, fdm_seed)
    }

    /// Reduces `child` (defined over the current step's subspaces) back
    /// onto `ancestor` subspaces using the same eigenvector blocks that
    /// built each child's basis, i.e. `rho_anc += U_block * rho_child *
    /// U_block^H`, weighted by the ancestor's symmetry multiplicity ratio.
    /// `fdm_running` accumulates the discarded-state contribution across
    /// shells when `self.fdm` is set; the caller threads the same
    /// accumulator through every step of the backward pass.
    pub fn reduce_backward<T: Scalar>(
        &self,
        child_state: &DiagState<T>,
        child_rho: &DensityMatrixSet<T>,
        symmetry: &dyn Symmetry,
        fdm_running: &mut Option<DensityMatrixSet<T>>,
        wn: ExtFloat,
    ) -> DensityMatrixSet<T> {
        if self.fdm {
            let discarded = discarded_block(child_state, child_rho);
            let running = fdm_running.get_or_insert_with(DensityMatrixSet::new);
            self.accumulate_fdm(running, &discarded, wn);
        }

        let mut out: BTreeMap<Invariant, Matrix<T>> = BTreeMap::new();
        for (child_inv, spec) in &child_state.spectra {
            let Some(rho) = child_rho.blocks.get(child_inv) else {
                continue;
            };
            let rows = rho.nrows().min(spec.stored());
            for block in &spec.blocks {
                let Some(u) = spec.block_columns(&block.ancestor, rows) else {
                    continue;
                };
                let contribution = u.transpose().map(|x| x.conjugate()) * rho.view((0, 0), (rows, rows)) * &u;
                let mult_ratio = symmetry.multiplicity(child_inv) as f64
                    / symmetry.multiplicity(&block.ancestor).max(1) as f64;
                let weighted = contribution.map(|x| x * T::from_real(mult_ratio));
                out.entry(block.ancestor.clone())
                    .and_modify(|acc| *acc += weighted.clone())
                    .or_insert(weighted);
            }
        }
        DensityMatrixSet { blocks: out }
    }

    /// FDM accumulation: add this shell's weighted discarded-state
    /// contribution into the running full density matrix, using the
    /// extended-precision shell weight `wn`. A subspace whose dimension
    /// changed since the last shell it appeared in (the same invariant
    /// label can name a differently-sized basis at different steps) is
    /// seeded fresh rather than added in place.
    pub fn accumulate_fdm<T: Scalar>(
        &self,
        running: &mut DensityMatrixSet<T>,
        shell_rho: &DensityMatrixSet<T>,
        wn: ExtFloat,
    ) {
        let w = T::from_real(wn.to_f64());
        for (invariant, block) in &shell_rho.blocks {
            let scaled = block.map(|x| x * w);
            match running.blocks.get(invariant) {
                Some(existing) if existing.shape() == scaled.shape() => {
                    *running.blocks.get_mut(invariant).unwrap() += scaled;
                }
                _ => {
                    running.blocks.insert(invariant.clone(), scaled);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariant::SymmetryKind;
    use crate::spectrum::Spectrum;
    use nalgebra::DMatrix;

    #[test]
    fn boltzmann_weights_sum_to_partition_function() {
        let sym = SymmetryKind::Qsz.capability();
        let mut state: DiagState<f64> = DiagState::new();
        state.insert(
            Invariant::new(vec![0, 0]),
            Spectrum::new(vec![0.0, 1.0], DMatrix::zeros(2, 2), 2),
        );
        let spec = state.spectra.get_mut(&Invariant::new(vec![0, 0])).unwrap();
        spec.v_zero = spec.v_orig.clone();
        let (weights, z) = boltzmann_density_matrix(&state, sym.as_ref(), 1.0);
        let expected_z: f64 = weights[&Invariant::new(vec![0, 0])].iter().sum();
        assert!((z - expected_z).abs() < 1e-12);
    }

    #[test]
    fn trace_of_normalized_seed_matrix_is_one() {
        let sym = SymmetryKind::Qsz.capability();
        let mut state: DiagState<f64> = DiagState::new();
        state.insert(
            Invariant::new(vec![0, 0]),
            Spectrum::new(vec![0.0, 1.0], DMatrix::zeros(2, 2), 2),
        );
        {
            let spec = state.spectra.get_mut(&Invariant::new(vec![0, 0])).unwrap();
            spec.v_zero = spec.v_orig.clone();
        }
        let (weights, z) = boltzmann_density_matrix(&state, sym.as_ref(), 1.0);
        let engine = DensityMatrixEngine::new(false);
        let (rho, fdm_seed) = engine.seed_last_shell(&state, &weights, z);
        assert!((rho.trace(sym.as_ref()) - 1.0).abs() < 1e-9);
        assert!(fdm_seed.is_none());
    }

    #[test]
    fn fdm_mode_seeds_a_running_accumulator_from_the_last_shell() {
        let sym = SymmetryKind::Qsz.capability();
        let mut state: DiagState<f64> = DiagState::new();
        state.insert(
            Invariant::new(vec![0, 0]),
            Spectrum::new(vec![0.0, 1.0], DMatrix::zeros(2, 2), 2),
        );
        {
            let spec = state.spectra.get_mut(&Invariant::new(vec![0, 0])).unwrap();
            spec.v_zero = spec.v_orig.clone();
        }
        let (weights, z) = boltzmann_density_matrix(&state, sym.as_ref(), 1.0);
        let engine = DensityMatrixEngine::new(true);
        let (_, fdm_seed) = engine.seed_last_shell(&state, &weights, z);
        assert!(fdm_seed.is_some());
    }
}
