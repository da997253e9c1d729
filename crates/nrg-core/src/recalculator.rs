//! Transforms an operator's blocks from the previous step's ancestor basis
//! into the current step's new eigenbasis: `O'[i1,i2] = sum_{a1,a2}
//! U1[a1]^H O[a1,a2] U2[a2]^T` restricted to the ancestor column blocks
//! that actually contributed to `i1`/`i2`.

use crate::diag_state::DiagState;
use crate::invariant::{Invariant, Symmetry};
use crate::operator::OperatorBlockSet;
use crate::scalar::Scalar;

/// Which rows of the previous step's eigenvector matrix to use when
/// recalculating an operator. `All` recomputes using every stored
/// eigenpair (more accurate, the default for small chains); `Kept` only
/// uses the eigenpairs that survived truncation (cheaper, used once the
/// chain grows long).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecalcStrategy {
    All,
    Kept,
}

fn rows_for<T: Scalar>(spec: &crate::spectrum::Spectrum<T>, strategy: RecalcStrategy) -> usize {
    match strategy {
        RecalcStrategy::All => spec.stored(),
        RecalcStrategy::Kept => spec.kept,
    }
}

/// Recalculate one operator's blocks in the new basis.
///
/// `new_layouts` gives, for each new subspace that has been built this
/// step, the `(ancestor, col_len)` layout its block Hamiltonian was
/// assembled with (so the ancestor columns line up with `old_op`'s rows).
pub fn recalculate<T: Scalar>(
    old_op: &OperatorBlockSet<T>,
    new_state: &DiagState<T>,
    _symmetry: &dyn Symmetry,
    strategy: RecalcStrategy,
) -> OperatorBlockSet<T> {
    let mut out = OperatorBlockSet::new();

    for (i1, spec1) in &new_state.spectra {
        for (i2, spec2) in &new_state.spectra {
            let mut accumulated: Option<crate::scalar::Matrix<T>> = None;
            for block1 in &spec1.blocks {
                for block2 in &spec2.blocks {
                    let Some(old_block) = old_op.get(&block1.ancestor, &block2.ancestor) else {
                        continue;
                    };
                    let rows1 = rows_for(spec1, strategy);
                    let rows2 = rows_for(spec2, strategy);
                    let Some(u1) = spec1.block_columns(&block1.ancestor, rows1) else {
                        continue;
                    };
                    let Some(u2) = spec2.block_columns(&block2.ancestor, rows2) else {
                        continue;
                    };
                    if old_block.nrows() != u1.ncols() || old_block.ncols() != u2.ncols() {
                        continue;
                    }
                    let contribution = u1.clone() * old_block * u2.transpose().map(|x| x.conjugate());
                    accumulated = Some(match accumulated {
                        Some(acc) => acc + contribution,
                        None => contribution,
                    });
                }
            }
            if let Some(block) = accumulated {
                if block.iter().any(|x| x.modulus_squared() > 1e-24) {
                    out.insert(i1.clone(), i2.clone(), block);
                }
            }
        }
    }

    out
}
