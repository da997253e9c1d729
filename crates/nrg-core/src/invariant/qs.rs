//! `QS` symmetry: total charge `Q` and twice the total spin `SS = 2S`,
//! single conduction channel.
//!
//! A single added Wilson-chain site carries four microscopic contributions
//! to the next shell: nothing added, one fermion added with spin up or
//! down (a spin-1/2 doublet), or a spin-singlet pair added. In `(ΔQ, ΔSS)`
//! form these are the four "ancestor" combinations.

use super::{AncestorLink, Invariant, Symmetry};

const SITE_SHIFTS: [(i32, i32); 4] = [(0, 0), (1, 1), (1, -1), (2, 0)];

#[derive(Debug, Clone, Copy, Default)]
pub struct Qs;

impl Symmetry for Qs {
    fn name(&self) -> &'static str {
        "QS"
    }

    fn n_channels(&self) -> usize {
        1
    }

    fn compose(&self, a: &Invariant, b: &Invariant) -> Invariant {
        Invariant::new(vec![a.get(0) + b.get(0), a.get(1) + b.get(1)])
    }

    fn multiplicity(&self, i: &Invariant) -> u32 {
        // SS = 2S, so dimension of the spin multiplet is SS + 1.
        (i.get(1).max(0) as u32) + 1
    }

    fn triangle_allowed(&self, i_new: &Invariant, i_anc: &Invariant, i_op: &Invariant) -> bool {
        if i_anc.get(1) < 0 {
            return false;
        }
        self.compose(i_anc, i_op) == *i_new
    }

    fn ancestor_candidates(&self, i_new: &Invariant) -> Vec<AncestorLink> {
        let (q, ss) = (i_new.get(0), i_new.get(1));
        SITE_SHIFTS
            .iter()
            .filter_map(|&(dq, dss)| {
                let anc_q = q - dq;
                let anc_ss = ss - dss;
                if anc_ss < 0 {
                    return None;
                }
                Some(AncestorLink {
                    ancestor: Invariant::new(vec![anc_q, anc_ss]),
                    op_invariant: Invariant::new(vec![dq, dss]),
                })
            })
            .collect()
    }

    fn site_operator_invariants(&self) -> Vec<Invariant> {
        SITE_SHIFTS
            .iter()
            .map(|&(dq, dss)| Invariant::new(vec![dq, dss]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestor_candidates_drop_negative_spin() {
        let sym = Qs;
        // Singlet (Q=0, SS=0): the "one fermion, spin down" ancestor would
        // require SS_anc = 0 - (-1) = 1 >= 0, so it's allowed; but the
        // ancestor from a (ΔQ=1, ΔSS=1) shift at SS_new=0 needs SS_anc=-1,
        // which must be dropped.
        let target = Invariant::new(vec![0, 0]);
        let cands = sym.ancestor_candidates(&target);
        assert!(cands.iter().all(|c| c.ancestor.get(1) >= 0));
    }

    #[test]
    fn triangle_allowed_matches_compose() {
        let sym = Qs;
        let anc = Invariant::new(vec![0, 1]);
        let op = Invariant::new(vec![1, 1]);
        let target = sym.compose(&anc, &op);
        assert!(sym.triangle_allowed(&target, &anc, &op));
        let wrong = Invariant::new(vec![9, 9]);
        assert!(!sym.triangle_allowed(&wrong, &anc, &op));
    }

    #[test]
    fn multiplicity_is_ss_plus_one() {
        let sym = Qs;
        assert_eq!(sym.multiplicity(&Invariant::new(vec![0, 2])), 3);
        assert_eq!(sym.multiplicity(&Invariant::new(vec![1, 0])), 1);
    }
}
