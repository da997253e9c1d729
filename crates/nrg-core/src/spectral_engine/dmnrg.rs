//! DM-NRG spectral accumulator: like `ft`, but weighted by the backward-
//! propagated reduced density matrix instead of each shell's own raw
//! Boltzmann weight, so later shells correct the thermal occupation of
//! earlier ones.

use crate::density_matrix::DensityMatrixSet;
use crate::diag_state::DiagState;
use crate::invariant::Symmetry;
use crate::scalar::Scalar;
use crate::spectral_engine::{LogGrid, OperatorPair};

pub struct DmnrgAccumulator {
    pub grid: LogGrid,
}

impl DmnrgAccumulator {
    pub fn new(e_min: f64, e_max: f64, bins_per_decade: usize) -> Self {
        DmnrgAccumulator {
            grid: LogGrid::new(e_min, e_max, bins_per_decade),
        }
    }

    /// Same contraction as `FtAccumulator::accumulate`, but `rho` here is
    /// the step's backward-propagated density matrix rather than its own
    /// Boltzmann seed, and only the discarded-state rows of `op1` (beyond
    /// `kept`) contribute — the kept subspace's contribution is deferred to
    /// the next step's recalculated operators.
    pub fn accumulate<T: Scalar>(
        &mut self,
        state: &DiagState<T>,
        rho: &DensityMatrixSet<T>,
        symmetry: &dyn Symmetry,
        pair: &OperatorPair<T>,
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
            let discarded_start = spec_i.kept;

            let rows = op1.nrows().min(rho_i.nrows());
            let cols = op1.ncols().min(op2.nrows());
            for a in discarded_start..rows {
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
                    self.grid.add_delta(e_diff, mult * weight_a * amp);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_accumulator_has_zero_weight() {
        let acc = DmnrgAccumulator::new(1e-8, 10.0, 10);
        assert_eq!(acc.grid.total_weight(), 0.0);
    }
}
