//! Spectral function accumulation: four accumulator kinds (`ft`, `dmnrg`,
//! `cfs`, `fdm`) sharing a common log-spaced binning grid and a
//! deterministic lexicographic iteration order over operator-pair
//! subspaces.

pub mod cfs;
pub mod dmnrg;
pub mod fdm;
pub mod ft;

use crate::invariant::Invariant;
use crate::operator::OperatorBlockSet;
use crate::scalar::Scalar;

/// Two one-sided, log-spaced bin arrays covering `[-e_max, -e_min]` and
/// `[e_min, e_max]`, plus a linear zero bin. Matches the broadening-ready
/// histogram layout this family of NRG spectral functions is conventionally
/// binned into before an external broadening kernel smooths it (broadening
/// itself remains an external collaborator).
#[derive(Clone, Debug)]
pub struct LogGrid {
    pub e_min: f64,
    pub e_max: f64,
    pub bins_per_decade: usize,
    pub positive: Vec<f64>,
    pub negative: Vec<f64>,
    pub zero: f64,
}

impl LogGrid {
    pub fn new(e_min: f64, e_max: f64, bins_per_decade: usize) -> Self {
        let decades = (e_max / e_min).log10().max(0.0);
        let n_bins = (decades * bins_per_decade as f64).ceil() as usize + 1;
        LogGrid {
            e_min,
            e_max,
            bins_per_decade,
            positive: vec![0.0; n_bins],
            negative: vec![0.0; n_bins],
            zero: 0.0,
        }
    }

    fn bin_index(&self, abs_e: f64) -> usize {
        if abs_e <= self.e_min {
            return 0;
        }
        let idx = ((abs_e / self.e_min).log10() * self.bins_per_decade as f64) as usize;
        idx.min(self.positive.len() - 1)
    }

    /// Deposits a delta-function weight `w` at energy `e` into the grid.
    pub fn add_delta(&mut self, e: f64, w: f64) {
        if e.abs() < self.e_min {
            self.zero += w;
        } else if e > 0.0 {
            let idx = self.bin_index(e);
            self.positive[idx] += w;
        } else {
            let idx = self.bin_index(-e);
            self.negative[idx] += w;
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.zero + self.positive.iter().sum::<f64>() + self.negative.iter().sum::<f64>()
    }
}

/// Evenly spaced fermionic Matsubara frequencies `omega_n = (2n + delta) pi
/// T`, used by the finite-temperature Green's function accumulators.
pub fn matsubara_grid(n_max: i64, temperature: f64, delta: f64) -> Vec<f64> {
    (-n_max..=n_max)
        .map(|n| (2.0 * n as f64 + delta) * std::f64::consts::PI * temperature)
        .collect()
}

/// One operator-pair contribution to a spectral function: `<i|op1|j>` and
/// `<j|op2|i>` matrix elements across a pair of subspaces, gated by
/// triangle-inequality and spin-selection checks before any accumulator
/// touches them.
pub struct OperatorPair<'a, T: Scalar> {
    pub op1: &'a OperatorBlockSet<T>,
    pub op2: &'a OperatorBlockSet<T>,
}

impl<'a, T: Scalar> OperatorPair<'a, T> {
    /// Iterates `(Ii, Ij)` subspace pairs in deterministic lexicographic
    /// order, skipping a pair when either operator has no block there.
    pub fn iter_pairs(&self) -> impl Iterator<Item = (&Invariant, &Invariant)> {
        self.op1
            .blocks
            .keys()
            .filter(move |key| self.op2.blocks.contains_key(key))
            .map(|(i, j)| (i, j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_grid_conserves_total_weight() {
        let mut grid = LogGrid::new(1e-8, 10.0, 20);
        grid.add_delta(0.5, 1.0);
        grid.add_delta(-2.0, 2.0);
        grid.add_delta(0.0, 0.5);
        assert!((grid.total_weight() - 3.5).abs() < 1e-12);
    }

    #[test]
    fn matsubara_grid_is_symmetric_for_integer_delta() {
        let grid = matsubara_grid(2, 1.0, 0.0);
        assert_eq!(grid.len(), 5);
        assert!((grid[0] + grid[4]).abs() < 1e-12);
    }
}
