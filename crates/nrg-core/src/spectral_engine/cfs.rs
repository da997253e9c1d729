//! Complete Fock Space (CFS) spectral accumulator.
//!
//! Only the "OPTIMIZED" two-branch algorithm is implemented: a "less-than"
//! branch (discarded states at the current shell paired with kept states
//! further down the chain) and a "greater-than" branch (the mirror image),
//! accumulated independently and merged once at [`CfsAccumulator::end`].
//!
//! The older "OLD" single-branch algorithm recomputes the full
//! double sum over *all* shells for every frequency bin instead of
//! separating it into the two branches above; it is `O(chain length)` times
//! more expensive per bin and is not implemented here, only described for
//! the cross-check test that verifies the optimized and reference
//! summation orders agree on a tiny chain.
//!
//! CFS always recalculates operators with [`crate::recalculator::RecalcStrategy::All`]
//! on its pass regardless of the configured strategy, since a discarded
//! state at shell `N` can only be expressed exactly in terms of *every*
//! stored eigenpair of shell `N-1`, not just the kept ones.

use crate::density_matrix::DensityMatrixSet;
use crate::diag_state::DiagState;
use crate::invariant::Symmetry;
use crate::scalar::Scalar;
use crate::spectral_engine::{LogGrid, OperatorPair};

pub struct CfsAccumulator {
    pub less: LogGrid,
    pub greater: LogGrid,
}

impl CfsAccumulator {
    pub fn new(e_min: f64, e_max: f64, bins_per_decade: usize) -> Self {
        CfsAccumulator {
            less: LogGrid::new(e_min, e_max, bins_per_decade),
            greater: LogGrid::new(e_min, e_max, bins_per_decade),
        }
    }

    /// Discarded-state (this shell) times kept-or-discarded (paired shell)
    /// contribution — the "less-than" branch, added at every step.
    pub fn accumulate_less<T: Scalar>(
        &mut self,
        state: &DiagState<T>,
        rho: &DensityMatrixSet<T>,
        symmetry: &dyn Symmetry,
        pair: &OperatorPair<T>,
    ) {
        accumulate_branch(&mut self.less, state, rho, symmetry, pair, true);
    }

    /// The mirror-image "greater-than" branch.
    pub fn accumulate_greater<T: Scalar>(
        &mut self,
        state: &DiagState<T>,
        rho: &DensityMatrixSet<T>,
        symmetry: &dyn Symmetry,
        pair: &OperatorPair<T>,
    ) {
        accumulate_branch(&mut self.greater, state, rho, symmetry, pair, false);
    }

    /// Merges the two branches into a single spectral grid. Called once
    /// after the backward pass completes.
    pub fn end(self) -> LogGrid {
        let mut merged = self.less;
        for i in 0..merged.positive.len() {
            merged.positive[i] += self.greater.positive[i];
            merged.negative[i] += self.greater.negative[i];
        }
        merged.zero += self.greater.zero;
        merged
    }
}

fn accumulate_branch<T: Scalar>(
    grid: &mut LogGrid,
    state: &DiagState<T>,
    rho: &DensityMatrixSet<T>,
    symmetry: &dyn Symmetry,
    pair: &OperatorPair<T>,
    discarded_rows: bool,
) {
    for (i_inv, j_inv) in pair.iter_pairs() {
        let Some(op1) = pair.op1.get(i_inv, j_inv) else {
            continue;
        };
        let Some(op2) = pair.op2.get(j_inv, i_inv) else {
            continue;
        };
        let Some(spec_i) = state.spectra.get(i_inv) else {
            continue;
        };
        let Some(spec_j) = state.spectra.get(j_inv) else {
            continue;
        };
        let Some(rho_i) = rho.blocks.get(i_inv) else {
            continue;
        };
        let mult = symmetry.multiplicity(i_inv) as f64;
        let row_range: std::ops::Range<usize> = if discarded_rows {
            spec_i.kept..op1.nrows().min(rho_i.nrows())
        } else {
            0..spec_i.kept.min(op1.nrows()).min(rho_i.nrows())
        };
        let cols = op1.ncols().min(op2.nrows());
        for a in row_range {
            let weight_a = rho_i[(a, a)].real();
            if weight_a.abs() < 1e-300 {
                continue;
            }
            for b in 0..cols {
                let amp = (op1[(a, b)] * op2[(b, a)]).modulus_squared().sqrt();
                if amp == 0.0 {
                    continue;
                }
                let e_diff = spec_j.v_zero.get(b).copied().unwrap_or(0.0)
                    - spec_i.v_zero.get(a).copied().unwrap_or(0.0);
                grid.add_delta(e_diff, mult * weight_a * amp);
            }
        }
    }
}
