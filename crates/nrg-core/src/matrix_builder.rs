//! Assembles the block Hamiltonian for one new-step subspace out of the
//! previous step's kept spectra plus the new site's hopping term.

use std::collections::BTreeMap;

use crate::chain::ChainShell;
use crate::diag_state::SubspaceDims;
use crate::error::{NrgError, Result};
use crate::invariant::{Invariant, Symmetry};
use crate::operator::OperatorBlocks;
use crate::scalar::{Matrix, Scalar};
use crate::step::StepTag;

/// Everything `build_block_hamiltonian` needs from the previous iteration:
/// the symmetry's composition rules, the chain's per-site coefficients,
/// the previous step's retained dimensions, and its hopping operator
/// blocks.
pub struct MatrixBuildContext<'a, T: Scalar> {
    pub symmetry: &'a dyn Symmetry,
    pub chain: &'a ChainShell,
    pub step: StepTag,
    pub prev_dims: &'a BTreeMap<Invariant, SubspaceDims>,
    pub prev_ops: &'a OperatorBlocks<T>,
}

impl<'a, T: Scalar> MatrixBuildContext<'a, T> {
    /// Build the dense block Hamiltonian for new subspace `target`,
    /// returning it along with the `(ancestor, block_len)` layout used to
    /// lay out its columns (needed later by `Spectrum::split_columns`).
    ///
    /// Column order follows `symmetry.ancestor_candidates(target)`, keeping
    /// only the ancestors actually present in the previous step (an
    /// ancestor subspace that carried zero states is simply absent).
    pub fn build_block_hamiltonian(
        &self,
        target: &Invariant,
    ) -> Result<(Matrix<T>, Vec<(Invariant, usize)>)> {
        let mut layout = Vec::new();
        let mut seen = std::collections::BTreeSet::new();
        for link in self.symmetry.ancestor_candidates(target) {
            if !seen.insert(link.ancestor.clone()) {
                continue;
            }
            if let Some(dims) = self.prev_dims.get(&link.ancestor) {
                layout.push((link.ancestor.clone(), dims.kept));
            }
        }

        if layout.is_empty() {
            return Err(NrgError::InsufficientStates {
                invariant: target.to_string(),
                step: self.step.n as i64,
                computed: 0,
                dim: 1,
            });
        }

        let total: usize = layout.iter().map(|(_, len)| *len).sum();
        let mut h = Matrix::<T>::zeros(total, total);
        // Every step rescales the previous step's (already shifted) spectrum
        // by the constant factor sqrt(lambda) (or its substeps-folded
        // variant), not by the absolute energy scale lambda^(-n/2) — the
        // latter is only used to convert stored reduced energies to
        // absolute ones on output.
        let rescale = self.chain.rescale_factor();

        let mut offset = 0usize;
        let mut offsets: BTreeMap<Invariant, usize> = BTreeMap::new();
        for (ancestor, len) in &layout {
            offsets.insert(ancestor.clone(), offset);
            let dims = &self.prev_dims[ancestor];
            for (i, &e) in dims.v_zero.iter().take(*len).enumerate() {
                h[(offset + i, offset + i)] = T::from_real(e * rescale);
            }
            offset += len;
        }

        // New-site hopping couples ancestor blocks whose op-invariants
        // differ by one site-operator label, channel by channel.
        for channel in 0..self.chain.n_channels().min(self.chain.channels.len()) {
            let xi = self
                .chain
                .channels
                .get(channel)
                .and_then(|c| c.xi.get(self.step.n))
                .copied()
                .unwrap_or(0.0);
            if xi == 0.0 {
                continue;
            }
            for flavor in 0..self.prev_ops.hopping.get(channel).map_or(0, |f| f.len()) {
                let op = self.prev_ops.hopping_op(channel, flavor);
                for ((i1, i2), block) in op.iter() {
                    let (Some(&o1), Some(&o2)) = (offsets.get(i1), offsets.get(i2)) else {
                        continue;
                    };
                    let rows = block.nrows().min(layout.iter().find(|(a, _)| a == i1).unwrap().1);
                    let cols = block.ncols().min(layout.iter().find(|(a, _)| a == i2).unwrap().1);
                    let coeff = T::from_real(xi);
                    for r in 0..rows {
                        for c in 0..cols {
                            let val = block[(r, c)] * coeff;
                            h[(o1 + r, o2 + c)] += val;
                            h[(o2 + c, o1 + r)] += val.conjugate();
                        }
                    }
                }
            }
        }

        Ok((h, layout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainShell, ChannelChain};
    use crate::invariant::SymmetryKind;
    use crate::operator::OperatorBlocks;

    #[test]
    fn single_ancestor_block_is_just_the_diagonal() {
        let sym = SymmetryKind::Qs.capability();
        let chain = ChainShell::new(2.0, vec![ChannelChain::new(vec![1.0], vec![0.0])]);
        let mut prev_dims = BTreeMap::new();
        prev_dims.insert(
            Invariant::new(vec![0, 0]),
            SubspaceDims {
                kept: 2,
                total: 2,
                dim: 2,
                block_offsets: vec![],
                last: false,
                v_zero: vec![0.0, 1.0],
                abs_e: vec![],
                abs_e_g: vec![],
                abs_e_n: vec![],
            },
        );
        let ops: OperatorBlocks<f64> = OperatorBlocks::new(1, 1);
        let ctx = MatrixBuildContext {
            symmetry: sym.as_ref(),
            chain: &chain,
            step: StepTag::new(0, 4, crate::step::Direction::Forward),
            prev_dims: &prev_dims,
            prev_ops: &ops,
        };
        let (h, layout) = ctx.build_block_hamiltonian(&Invariant::new(vec![0, 0])).unwrap();
        assert_eq!(layout, vec![(Invariant::new(vec![0, 0]), 2)]);
        assert_eq!(h.nrows(), 2);
    }
}
