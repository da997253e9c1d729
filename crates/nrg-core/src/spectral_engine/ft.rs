//! Full Boltzmann ("FT") spectral accumulator: a spectral function
//! evaluated directly from one shell's own thermal density matrix,
//! without propagating information from later shells.

use crate::density_matrix::DensityMatrixSet;
use crate::diag_state::DiagState;
use crate::invariant::Symmetry;
use crate::scalar::Scalar;
use crate::spectral_engine::{LogGrid, OperatorPair};

pub struct FtAccumulator {
    pub grid: LogGrid,
}

impl FtAccumulator {
    pub fn new(e_min: f64, e_max: f64, bins_per_decade: usize) -> Self {
        FtAccumulator {
            grid: LogGrid::new(e_min, e_max, bins_per_decade),
        }
    }

    /// Accumulates `A(omega) ~ sum_{ij} <i|op1|j><j|op2|i> rho_ii delta(omega
    /// - (E_j - E_i))` for one step's subspaces, gated by the shared
    /// `OperatorPair` triangle/availability check.
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

            let rows = op1.nrows().min(rho_i.nrows());
            let cols = op1.ncols().min(op2.nrows());
            for a in 0..rows {
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
