//! Full Density Matrix (FDM) spectral accumulator: structurally the same
//! two-branch accumulation as [`super::cfs`], but weighted per-shell by the
//! extended-precision shell weight `wn[N]` instead of each shell's local
//! Boltzmann factor, since FDM's `rho` already carries the full-chain
//! weighted density matrix built by [`crate::density_matrix::DensityMatrixEngine::accumulate_fdm`].

use crate::density_matrix::DensityMatrixSet;
use crate::diag_state::DiagState;
use crate::invariant::Symmetry;
use crate::scalar::Scalar;
use crate::spectral_engine::{LogGrid, OperatorPair};
use crate::stats::ExtFloat;

pub struct FdmAccumulator {
    pub less: LogGrid,
    pub greater: LogGrid,
}

impl FdmAccumulator {
    pub fn new(e_min: f64, e_max: f64, bins_per_decade: usize) -> Self {
        FdmAccumulator {
            less: LogGrid::new(e_min, e_max, bins_per_decade),
            greater: LogGrid::new(e_min, e_max, bins_per_decade),
        }
    }

    pub fn accumulate_shell<T: Scalar>(
        &mut self,
        state: &DiagState<T>,
        rho_fdm: &DensityMatrixSet<T>,
        symmetry: &dyn Symmetry,
        pair: &OperatorPair<T>,
        wn: ExtFloat,
        discarded_rows: bool,
    ) {
        let grid = if discarded_rows {
            &mut self.less
        } else {
            &mut self.greater
        };
        let w_n = wn.to_f64();
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
            let Some(rho_i) = rho_fdm.blocks.get(i_inv) else {
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
                let weight_a = rho_i[(a, a)].real() * w_n;
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
