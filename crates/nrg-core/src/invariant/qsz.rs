//! `QSZ` symmetry: charge `Q` and twice the z-projection of spin
//! `SZ = 2Sz`, both abelian, single conduction channel. Unlike `QS` there
//! is no spin-multiplet degeneracy to track: `multiplicity` is always 1.

use super::{AncestorLink, Invariant, Symmetry};

const SITE_SHIFTS: [(i32, i32); 4] = [(0, 0), (1, 1), (1, -1), (2, 0)];

#[derive(Debug, Clone, Copy, Default)]
pub struct Qsz;

impl Symmetry for Qsz {
    fn name(&self) -> &'static str {
        "QSZ"
    }

    fn n_channels(&self) -> usize {
        1
    }

    fn compose(&self, a: &Invariant, b: &Invariant) -> Invariant {
        Invariant::new(vec![a.get(0) + b.get(0), a.get(1) + b.get(1)])
    }

    fn multiplicity(&self, _i: &Invariant) -> u32 {
        1
    }

    fn triangle_allowed(&self, i_new: &Invariant, i_anc: &Invariant, i_op: &Invariant) -> bool {
        self.compose(i_anc, i_op) == *i_new
    }

    fn ancestor_candidates(&self, i_new: &Invariant) -> Vec<AncestorLink> {
        let (q, sz) = (i_new.get(0), i_new.get(1));
        SITE_SHIFTS
            .iter()
            .map(|&(dq, dsz)| AncestorLink {
                ancestor: Invariant::new(vec![q - dq, sz - dsz]),
                op_invariant: Invariant::new(vec![dq, dsz]),
            })
            .collect()
    }

    fn site_operator_invariants(&self) -> Vec<Invariant> {
        SITE_SHIFTS
            .iter()
            .map(|&(dq, dsz)| Invariant::new(vec![dq, dsz]))
            .collect()
    }
}
