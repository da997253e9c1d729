//! Chooses how many eigenstates to keep, globally across all of a step's
//! subspaces, following a fixed six-step cut: concatenate every subspace's
//! shifted eigenvalues unweighted, pick a cumulative count bounded by
//! `[Nkeep_min, Nkeep]`, extend it past any near-degenerate gap up to
//! `Nsg_max` extra states, then flag any subspace where too few eigenpairs
//! were computed to trust the resulting cut.

use std::collections::BTreeMap;

use crate::invariant::Invariant;
use crate::scalar::Scalar;
use crate::spectrum::Spectrum;

#[derive(Clone, Copy, Debug)]
pub struct TruncationPolicy {
    pub n_keep: usize,
    pub n_keep_min: usize,
    pub energy_cutoff: Option<f64>,
    pub degeneracy_tol: f64,
    pub n_sg_max: usize,
}

impl Default for TruncationPolicy {
    fn default() -> Self {
        TruncationPolicy {
            n_keep: 1000,
            n_keep_min: 0,
            energy_cutoff: None,
            degeneracy_tol: 1e-10,
            n_sg_max: 10,
        }
    }
}

struct Candidate {
    invariant: Invariant,
    index: usize,
    energy: f64,
}

/// Result of one truncation decision: the total number of states kept
/// across all subspaces, and the subset of subspaces whose cut landed on
/// an eigenpair the diagonalizer had actually computed (`kept == computed`)
/// while `computed` fell short of the subspace's full dimension and the
/// top computed eigenvalue never reached the cut — the signal that the
/// diagonalizer must be rerun for this step with a larger `diagratio`.
pub struct TruncationOutcome {
    pub total_kept: u64,
    pub insufficient: Vec<Invariant>,
}

/// Sets `Spectrum::kept` for every subspace in `spectra` according to
/// `policy`.
pub fn truncate<T: Scalar>(
    spectra: &mut BTreeMap<Invariant, Spectrum<T>>,
    policy: &TruncationPolicy,
) -> TruncationOutcome {
    // Step 1: concatenate all shifted eigenvalues across all subspaces,
    // sorted ascending. Not weighted by multiplicity — a literal count of
    // states, matching the configured Nkeep.
    let mut candidates: Vec<Candidate> = Vec::new();
    for (invariant, spec) in spectra.iter() {
        for (index, &energy) in spec.v_zero.iter().enumerate() {
            candidates.push(Candidate {
                invariant: invariant.clone(),
                index,
                energy,
            });
        }
    }
    candidates.sort_by(|a, b| a.energy.partial_cmp(&b.energy).unwrap());

    // Step 2: determine nrkeep.
    let mut nrkeep = match policy.energy_cutoff {
        Some(e_cut) if e_cut > 0.0 => {
            let count = candidates.iter().filter(|c| c.energy <= e_cut).count() + 1;
            count.clamp(policy.n_keep_min, policy.n_keep)
        }
        _ => policy.n_keep,
    };
    nrkeep = nrkeep.min(candidates.len());

    // Step 3: safeguard — extend the cut past any gap no larger than
    // degeneracy_tol, capped at n_sg_max extra states, so a near-degenerate
    // manifold is never split.
    let mut extra = 0usize;
    while nrkeep > 0
        && nrkeep < candidates.len()
        && extra < policy.n_sg_max
        && (candidates[nrkeep].energy - candidates[nrkeep - 1].energy).abs() <= policy.degeneracy_tol
    {
        nrkeep += 1;
        extra += 1;
    }

    // Step 4: Emax is the boundary energy; each subspace keeps every
    // eigenvalue <= Emax.
    let e_max = if nrkeep > 0 {
        candidates[nrkeep - 1].energy
    } else {
        f64::NEG_INFINITY
    };
    let mut kept_counts: BTreeMap<Invariant, usize> = BTreeMap::new();
    for c in candidates.iter().filter(|c| c.energy <= e_max) {
        let entry = kept_counts.entry(c.invariant.clone()).or_insert(0);
        *entry = (*entry).max(c.index + 1);
    }

    // Step 5: insufficient-states detection. If a subspace's cut lands
    // exactly on its last computed eigenpair, but the diagonalizer only
    // computed a fraction of that subspace's true dimension and that last
    // computed eigenvalue still sits below Emax, the cut can't be trusted:
    // states the diagonalizer never produced might belong above it.
    let mut insufficient = Vec::new();
    for (invariant, spec) in spectra.iter() {
        let computed = spec.stored();
        let kept = kept_counts.get(invariant).copied().unwrap_or(0);
        if kept == computed && computed < spec.dim {
            let top = spec.v_zero.last().copied().unwrap_or(f64::NEG_INFINITY);
            if top < e_max {
                insufficient.push(invariant.clone());
            }
        }
    }

    let mut total_kept = 0u64;
    for (invariant, spec) in spectra.iter_mut() {
        spec.kept = kept_counts.get(invariant).copied().unwrap_or(0);
        total_kept += spec.kept as u64;
    }

    TruncationOutcome {
        total_kept,
        insufficient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    #[test]
    fn never_splits_a_degenerate_manifold() {
        let mut spectra: BTreeMap<Invariant, Spectrum<f64>> = BTreeMap::new();
        let mut a = Spectrum::new(vec![0.0, 1.0, 1.0, 2.0], DMatrix::zeros(4, 4), 4);
        a.v_zero = a.v_orig.clone();
        spectra.insert(Invariant::new(vec![0, 0]), a);

        let policy = TruncationPolicy {
            n_keep: 2,
            n_keep_min: 0,
            energy_cutoff: None,
            degeneracy_tol: 1e-9,
            n_sg_max: 10,
        };
        truncate(&mut spectra, &policy);
        // n_keep=2 lands mid-degenerate-pair (indices 1,2 both at energy 1.0);
        // the cut must extend to include both.
        assert_eq!(spectra[&Invariant::new(vec![0, 0])].kept, 3);
    }

    #[test]
    fn safeguard_is_capped_at_n_sg_max() {
        let mut spectra: BTreeMap<Invariant, Spectrum<f64>> = BTreeMap::new();
        // Every consecutive gap sits just under degeneracy_tol, so an
        // uncapped safeguard would keep walking the cut out past n_keep
        // indefinitely; n_sg_max must stop it after exactly 3 extra states.
        let values: Vec<f64> = (0..20).map(|i| i as f64 * 5e-10).collect();
        let mut a = Spectrum::new(values, DMatrix::zeros(20, 20), 20);
        a.v_zero = a.v_orig.clone();
        spectra.insert(Invariant::new(vec![0, 0]), a);

        let policy = TruncationPolicy {
            n_keep: 2,
            n_keep_min: 0,
            energy_cutoff: None,
            degeneracy_tol: 1e-9,
            n_sg_max: 3,
        };
        truncate(&mut spectra, &policy);
        assert_eq!(spectra[&Invariant::new(vec![0, 0])].kept, 5);
    }

    #[test]
    fn flags_subspace_as_insufficient_when_diagratio_truncated_it() {
        let mut spectra: BTreeMap<Invariant, Spectrum<f64>> = BTreeMap::new();
        // dim = 10 but only 3 eigenpairs were actually computed (as a
        // partial diagratio < 1 solve would produce); the cut wants 3
        // states and lands squarely on the last computed eigenvalue, which
        // is still below the global Emax set by another subspace.
        let mut a = Spectrum::new(vec![0.0, 0.1, 0.2], DMatrix::zeros(3, 10), 10);
        a.v_zero = a.v_orig.clone();
        spectra.insert(Invariant::new(vec![0, 0]), a);
        let mut b = Spectrum::new(vec![0.5], DMatrix::zeros(1, 1), 1);
        b.v_zero = b.v_orig.clone();
        spectra.insert(Invariant::new(vec![1, 1]), b);

        let policy = TruncationPolicy {
            n_keep: 4,
            n_keep_min: 0,
            energy_cutoff: None,
            degeneracy_tol: 1e-9,
            n_sg_max: 0,
        };
        let outcome = truncate(&mut spectra, &policy);
        assert_eq!(outcome.insufficient, vec![Invariant::new(vec![0, 0])]);
    }

    #[test]
    fn fully_computed_subspace_at_the_cut_is_not_flagged() {
        let mut spectra: BTreeMap<Invariant, Spectrum<f64>> = BTreeMap::new();
        let mut a = Spectrum::new(vec![0.0, 1.0], DMatrix::zeros(2, 2), 2);
        a.v_zero = a.v_orig.clone();
        spectra.insert(Invariant::new(vec![0, 0]), a);

        let policy = TruncationPolicy::default();
        let outcome = truncate(&mut spectra, &policy);
        assert!(outcome.insufficient.is_empty());
    }
}
