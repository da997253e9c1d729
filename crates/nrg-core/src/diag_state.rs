//! Per-step collection of subspace spectra, indexed by invariant label.
//!
//! Uses `BTreeMap` rather than `HashMap` throughout: the engine's ordering
//! guarantees require that subsequent serial passes visit subspaces in a
//! deterministic order, which a hash map's iteration order cannot promise.

use std::collections::BTreeMap;

use crate::invariant::Invariant;
use crate::scalar::Scalar;
use crate::spectrum::Spectrum;

/// The durable snapshot of one `(step, invariant)` pair that survives after
/// `Spectrum::eigenvectors` is dropped to save memory.
/// `MatrixBuilder` and `DensityMatrixEngine` only need these
/// fields from the previous step, not the full spectrum.
#[derive(Clone, Debug)]
pub struct SubspaceDims {
    pub kept: usize,
    pub total: usize,
    pub dim: usize,
    pub block_offsets: Vec<(Invariant, usize, usize)>,
    pub last: bool,
    pub v_zero: Vec<f64>,
    pub abs_e: Vec<f64>,
    pub abs_e_g: Vec<f64>,
    pub abs_e_n: Vec<f64>,
}

impl SubspaceDims {
    pub fn from_spectrum<T: Scalar>(spec: &Spectrum<T>, last: bool) -> Self {
        SubspaceDims {
            kept: spec.kept,
            total: spec.stored(),
            dim: spec.dim,
            block_offsets: spec
                .blocks
                .iter()
                .map(|b| (b.ancestor.clone(), b.offset, b.len))
                .collect(),
            last,
            v_zero: spec.v_zero.clone(),
            abs_e: spec.abs_e.clone(),
            abs_e_g: spec.abs_e_g.clone(),
            abs_e_n: spec.abs_e_n.clone(),
        }
    }
}

/// Mapping invariant -> subspace spectrum for the current step, plus the
/// parallel `SubspaceDims` snapshot that survives eigenvector disposal.
#[derive(Clone, Debug, Default)]
pub struct DiagState<T: Scalar> {
    pub spectra: BTreeMap<Invariant, Spectrum<T>>,
    pub dims: BTreeMap<Invariant, SubspaceDims>,
}

impl<T: Scalar> DiagState<T> {
    pub fn new() -> Self {
        DiagState {
            spectra: BTreeMap::new(),
            dims: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, invariant: Invariant, spectrum: Spectrum<T>) {
        self.spectra.insert(invariant, spectrum);
    }

    /// Snapshot every subspace's `SubspaceDims` for persistence /
    /// next-step use, marking whether this was the chain's last step.
    pub fn snapshot_dims(&mut self, last: bool) {
        self.dims = self
            .spectra
            .iter()
            .map(|(inv, spec)| (inv.clone(), SubspaceDims::from_spectrum(spec, last)))
            .collect();
    }

    /// Global minimum shifted eigenvalue across all subspaces; must be
    /// (near) zero once every subspace's ground state has been subtracted
    /// with the same global `Egs`.
    pub fn min_v_zero(&self) -> Option<f64> {
        self.spectra
            .values()
            .filter_map(|s| s.v_zero.iter().cloned().fold(None, |acc, v| {
                Some(acc.map_or(v, |a: f64| a.min(v)))
            }))
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
    }

    /// Global ground-state energy across all subspaces (the minimum
    /// original eigenvalue), used as `Egs` for `subtract_ground_state`.
    pub fn global_ground_state(&self) -> Option<f64> {
        self.spectra
            .values()
            .filter_map(|s| s.v_orig.first().copied())
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    #[test]
    fn global_ground_state_is_minimum_across_subspaces() {
        let mut state: DiagState<f64> = DiagState::new();
        state.insert(
            Invariant::new(vec![0, 0]),
            crate::spectrum::Spectrum::new(vec![1.0, 2.0], DMatrix::zeros(2, 2), 2),
        );
        state.insert(
            Invariant::new(vec![1, 1]),
            crate::spectrum::Spectrum::new(vec![-0.5, 3.0], DMatrix::zeros(2, 2), 2),
        );
        assert_eq!(state.global_ground_state(), Some(-0.5));
    }
}
