//! Sparse operator matrix storage: `(I1, I2) -> dense matrix`, plus the
//! named operator-set collections and the two-level hopping array
//! (hopping blocks).

use std::collections::{BTreeMap, HashMap};

use crate::invariant::Invariant;
use crate::scalar::{Matrix, Scalar};

/// One operator, stored as a sparse map of dense blocks keyed by the
/// `(bra, ket)` invariant pair.
#[derive(Clone, Debug, Default)]
pub struct OperatorBlockSet<T: Scalar> {
    pub blocks: BTreeMap<(Invariant, Invariant), Matrix<T>>,
}

impl<T: Scalar> OperatorBlockSet<T> {
    pub fn new() -> Self {
        OperatorBlockSet {
            blocks: BTreeMap::new(),
        }
    }

    pub fn get(&self, i1: &Invariant, i2: &Invariant) -> Option<&Matrix<T>> {
        self.blocks.get(&(i1.clone(), i2.clone()))
    }

    pub fn insert(&mut self, i1: Invariant, i2: Invariant, m: Matrix<T>) {
        self.blocks.insert((i1, i2), m);
    }

    /// Squared Frobenius-norm sum over every stored block, weighted by a
    /// per-pair factor — the building block of the operator sum-rule checks
    /// in the sum-rule checks.
    pub fn weighted_frobenius_sum(&self, factor: impl Fn(&Invariant, &Invariant) -> f64) -> f64 {
        self.blocks
            .iter()
            .map(|((i1, i2), m)| {
                let norm_sq: f64 = m.iter().map(|x| x.modulus_squared()).sum();
                factor(i1, i2) * norm_sq
            })
            .sum()
    }

    /// Deterministic (lexicographic on the key) iterator over the stored
    /// blocks, matching the engine's deterministic subspace-pair iteration
    /// ordering requirement.
    pub fn iter(&self) -> impl Iterator<Item = (&(Invariant, Invariant), &Matrix<T>)> {
        self.blocks.iter()
    }
}

/// The full collection of operator sets carried between steps, grouped by
/// tensor character, plus the channel x flavor hopping array.
#[derive(Clone, Debug, Default)]
pub struct OperatorBlocks<T: Scalar> {
    pub singlets_even: HashMap<String, OperatorBlockSet<T>>,
    pub singlets_odd: HashMap<String, OperatorBlockSet<T>>,
    pub global_singlet: Option<OperatorBlockSet<T>>,
    pub doublets: HashMap<String, OperatorBlockSet<T>>,
    pub triplets: HashMap<String, OperatorBlockSet<T>>,
    pub quadruplets: HashMap<String, OperatorBlockSet<T>>,
    pub orbital_triplets: HashMap<String, OperatorBlockSet<T>>,
    /// `hopping[channel][flavor]`.
    pub hopping: Vec<Vec<OperatorBlockSet<T>>>,
}

impl<T: Scalar> OperatorBlocks<T> {
    pub fn new(n_channels: usize, n_flavors: usize) -> Self {
        OperatorBlocks {
            singlets_even: HashMap::new(),
            singlets_odd: HashMap::new(),
            global_singlet: None,
            doublets: HashMap::new(),
            triplets: HashMap::new(),
            quadruplets: HashMap::new(),
            orbital_triplets: HashMap::new(),
            hopping: vec![vec![OperatorBlockSet::new(); n_flavors]; n_channels],
        }
    }

    pub fn hopping_op(&self, channel: usize, flavor: usize) -> &OperatorBlockSet<T> {
        &self.hopping[channel][flavor]
    }

    pub fn hopping_op_mut(&mut self, channel: usize, flavor: usize) -> &mut OperatorBlockSet<T> {
        &mut self.hopping[channel][flavor]
    }

    /// Looks up a named operator set across every tensor-character map, in
    /// the order singlet-even, singlet-odd, doublet, triplet, quadruplet,
    /// orbital-triplet. Used by the spectral accumulation pass to resolve a
    /// user-configured operator name without the caller needing to know
    /// which character it carries.
    pub fn named(&self, name: &str) -> Option<&OperatorBlockSet<T>> {
        self.singlets_even
            .get(name)
            .or_else(|| self.singlets_odd.get(name))
            .or_else(|| self.doublets.get(name))
            .or_else(|| self.triplets.get(name))
            .or_else(|| self.quadruplets.get(name))
            .or_else(|| self.orbital_triplets.get(name))
    }
}

/// Character tag used by the recalculator and sum-rule checks to pick the
/// right named map and the right recalculation table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    SingletEven,
    SingletOdd,
    GlobalSinglet,
    Doublet,
    Triplet,
    Quadruplet,
    OrbitalTriplet,
    Hopping,
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    #[test]
    fn weighted_frobenius_sum_accumulates_all_blocks() {
        let mut set: OperatorBlockSet<f64> = OperatorBlockSet::new();
        set.insert(
            Invariant::new(vec![0]),
            Invariant::new(vec![1]),
            DMatrix::from_element(2, 2, 1.0),
        );
        let sum = set.weighted_frobenius_sum(|_, _| 2.0);
        assert!((sum - 8.0).abs() < 1e-12);
    }
}
