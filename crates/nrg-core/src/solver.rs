//! Top-level orchestration: the per-site loop (`MatrixBuilder ->
//! Diagonalizer -> Truncator -> Recalculator -> SpectralEngine`) on the
//! forward pass, and the density-matrix-driven backward pass. Owns the
//! retry policy for `InsufficientStates` and sequencing across the two
//! passes; deliberately *not* a CLI concern, so the library is usable
//! without any command-line front end.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use crate::chain::ChainShell;
use crate::config::{NrgConfig, Strategy};
use crate::density_matrix::{self, DensityMatrixEngine, DensityMatrixSet};
use crate::diag_state::DiagState;
use crate::diagonalizer::{DiagResult, DiagTask, Diagonalizer};
use crate::error::{NrgError, Result};
use crate::invariant::{Invariant, Symmetry};
use crate::matrix_builder::MatrixBuildContext;
use crate::operator::OperatorBlocks;
use crate::output;
use crate::persistence;
use crate::recalculator::{self, RecalcStrategy};
use crate::scalar::{Matrix, Scalar};
use crate::spectral_engine::cfs::CfsAccumulator;
use crate::spectral_engine::dmnrg::DmnrgAccumulator;
use crate::spectral_engine::fdm::FdmAccumulator;
use crate::spectral_engine::ft::FtAccumulator;
use crate::spectral_engine::OperatorPair;
use crate::spectrum::Spectrum;
use crate::step::{Direction, StepTag};
use crate::stats::{ExtFloat, Stats, Thermo, ThermoFdm};
use crate::truncator::{self, TruncationOutcome, TruncationPolicy};
use crate::utils::logging;
use crate::workdir::WorkDir;

pub struct Solver<T: Scalar> {
    symmetry: Box<dyn Symmetry>,
    chain: ChainShell,
    diagonalizer: Box<dyn Diagonalizer<T>>,
    config: NrgConfig,
    workdir: WorkDir,
    stats: Stats,
}

impl<T: Scalar> Solver<T> {
    pub fn new(
        symmetry: Box<dyn Symmetry>,
        chain: ChainShell,
        diagonalizer: Box<dyn Diagonalizer<T>>,
        config: NrgConfig,
        workdir: WorkDir,
    ) -> Self {
        logging::init();
        Solver {
            symmetry,
            chain,
            diagonalizer,
            config,
            workdir,
            stats: Stats::new(),
        }
    }

    fn truncation_policy(&self) -> TruncationPolicy {
        TruncationPolicy {
            n_keep: self.config.keep,
            n_keep_min: self.config.keep_min,
            energy_cutoff: self.config.keep_energy,
            degeneracy_tol: self.config.safeguard,
            n_sg_max: self.config.safeguard_max,
        }
    }

    fn seed_initial(&self) -> DiagState<T> {
        let mut state = DiagState::new();
        let vacuum = Invariant::new(vec![0i32; 2]);
        let mut seed = Matrix::<T>::zeros(1, 1);
        seed[(0, 0)] = T::from_real(1.0);
        let mut spec = Spectrum::new(vec![0.0], seed, 1);
        spec.v_zero = spec.v_orig.clone();
        spec.kept = 1;
        spec.split_columns(&[(vacuum.clone(), 1)]);
        state.insert(vacuum, spec);
        state
    }

    fn candidate_targets(&self, prev: &DiagState<T>) -> Vec<Invariant> {
        let mut targets = BTreeSet::new();
        for ancestor in prev.spectra.keys() {
            for op_inv in self.symmetry.site_operator_invariants() {
                targets.insert(self.symmetry.compose(ancestor, &op_inv));
            }
        }
        targets.into_iter().collect()
    }

    /// Runs one forward step at a given `diagratio`. A target with no
    /// viable ancestor simply carries no population forward and is
    /// dropped rather than treated as a hard failure, unless it is the
    /// only candidate at step 0 — then the whole step is
    /// `InsufficientStates`, which the caller may retry.
    fn diagonalize_step(
        &self,
        prev: &DiagState<T>,
        prev_ops: &OperatorBlocks<T>,
        step: StepTag,
        diagratio: f64,
    ) -> Result<(DiagState<T>, BTreeMap<Invariant, Vec<(Invariant, usize)>>)> {
        let targets = self.candidate_targets(prev);
        let mut tasks = Vec::new();
        let mut layouts = BTreeMap::new();

        let ctx = MatrixBuildContext {
            symmetry: self.symmetry.as_ref(),
            chain: &self.chain,
            step,
            prev_dims: &prev.dims,
            prev_ops,
        };

        for target in &targets {
            match ctx.build_block_hamiltonian(target) {
                Ok((h, layout)) => {
                    layouts.insert(target.clone(), layout);
                    tasks.push(DiagTask {
                        invariant: target.clone(),
                        hamiltonian: h,
                    });
                }
                Err(NrgError::InsufficientStates { .. }) => {
                    debug!(invariant = %target, "no ancestor subspace, dropping target");
                }
                Err(e) => return Err(e),
            }
        }

        if tasks.is_empty() {
            return Err(NrgError::InsufficientStates {
                invariant: "*".into(),
                step: step.n as i64,
                computed: 0,
                dim: 1,
            });
        }

        let solved: BTreeMap<Invariant, DiagResult<T>> = self.diagonalizer.diagonalize_all(tasks, diagratio)?;

        let mut state = DiagState::new();
        for (invariant, result) in solved {
            let dim = result.eigenvectors.ncols();
            let mut spec = Spectrum::new(result.eigenvalues, result.eigenvectors, dim);
            if let Some(layout) = layouts.get(&invariant) {
                spec.split_columns(layout);
            }
            state.insert(invariant, spec);
        }

        let egs = state.global_ground_state().unwrap_or(0.0);
        for spec in state.spectra.values_mut() {
            spec.subtract_ground_state(egs);
        }

        Ok((state, layouts))
    }

    /// Diagonalizes and truncates one step, restarting with a larger
    /// `diagratio` whenever truncation reports a subspace as
    /// insufficiently resolved, or the diagonalization itself fails with a
    /// retryable error. Converges once every subspace has enough computed
    /// eigenpairs to trust the global cut, or the retry budget (derived
    /// from how many doublings it takes `diagratio` to reach `1.0`) runs
    /// out.
    fn run_step_with_retry(
        &self,
        current: &DiagState<T>,
        ops: &OperatorBlocks<T>,
        step: StepTag,
        policy: &TruncationPolicy,
    ) -> Result<(DiagState<T>, TruncationOutcome)> {
        let mut diagratio = self.config.diagratio.clamp(1e-4, 1.0);
        let max_retries = if diagratio >= 1.0 {
            0
        } else {
            ((1.0 / diagratio).log2().ceil() as usize) + 1
        };
        let mut retries = 0usize;

        loop {
            match self.diagonalize_step(current, ops, step, diagratio) {
                Ok((mut next, _layouts)) => {
                    let outcome = truncator::truncate(&mut next.spectra, policy);
                    if outcome.insufficient.is_empty() || diagratio >= 1.0 || retries >= max_retries {
                        return Ok((next, outcome));
                    }
                    debug!(
                        step = step.n,
                        insufficient = outcome.insufficient.len(),
                        diagratio,
                        "retrying step with larger diagratio"
                    );
                    retries += 1;
                    diagratio = (diagratio * self.config.restart_factor).min(1.0);
                }
                Err(e) if e.is_retryable() && diagratio < 1.0 && retries < max_retries => {
                    retries += 1;
                    diagratio = (diagratio * self.config.restart_factor).min(1.0);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs the full forward pass, returning the last step's diag state
    /// and the operator blocks recalculated up to that step (the backward
    /// pass needs both to seed spectral accumulation at the last shell).
    #[instrument(skip(self))]
    pub fn run_forward(&mut self) -> Result<(DiagState<T>, OperatorBlocks<T>)>
    where
        T: serde::Serialize,
    {
        self.workdir.ensure_exists()?;
        let mut current = self.seed_initial();
        let mut ops: OperatorBlocks<T> = OperatorBlocks::new(self.chain.n_channels().max(1), 1);

        let last_n = if self.config.stopafter > 0 {
            self.chain.n_max.min(self.config.stopafter)
        } else {
            self.chain.n_max
        };

        let strategy = match self.config.strategy {
            Strategy::All => RecalcStrategy::All,
            Strategy::Kept => RecalcStrategy::Kept,
        };

        current.snapshot_dims(last_n == 0);

        for n in 0..=last_n {
            let step = StepTag::new(n, self.chain.n_max, Direction::Forward);
            info!(step = n, "forward step");

            let policy = self.truncation_policy();
            let (mut next, outcome) = self.run_step_with_retry(&current, &ops, step, &policy)?;
            debug!(kept = outcome.total_kept, "step truncated");
            if step.is_last() || n == last_n {
                for spec in next.spectra.values_mut() {
                    spec.kept = spec.stored();
                }
            }
            next.snapshot_dims(step.is_last());

            for channel in 0..ops.hopping.len() {
                for flavor in 0..ops.hopping[channel].len() {
                    let recalculated = recalculator::recalculate(
                        ops.hopping_op(channel, flavor),
                        &next,
                        self.symmetry.as_ref(),
                        strategy,
                    );
                    *ops.hopping_op_mut(channel, flavor) = recalculated;
                }
            }

            if step.needs_persistence(Direction::Backward) {
                persistence::dump_transformations(&self.workdir.unitary_path(n as i64), &next)?;
            }
            output::write_subspaces(&self.workdir.subspaces_path(), n as i64, &next)?;
            output::write_energies(&self.workdir.energies_path(), n as i64, &next)?;
            output::write_absolute_energies(
                &self.workdir.absolute_energies_path(),
                n as i64,
                &next,
                self.chain.energy_scale(n),
            )?;
            output::write_annotated(&self.workdir.annotated_path(), n as i64, &next, self.symmetry.as_ref())?;

            current = next;
        }

        Ok((current, ops))
    }

    /// Runs the backward (density-matrix) pass using the transformation
    /// matrices saved during `run_forward`, accumulating the FT
    /// thermodynamic table and, when any of `dm`/`cfs`/`dmnrg`/`fdm` is
    /// enabled, the spectral accumulators seeded from `last_ops`.
    #[instrument(skip(self, last_state, last_ops))]
    pub fn run_backward(
        &mut self,
        last_state: &DiagState<T>,
        last_ops: &OperatorBlocks<T>,
    ) -> Result<DensityMatrixSet<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let sc_t = self.config.temperature.max(1e-12);
        let (weights, z) = density_matrix::boltzmann_density_matrix(last_state, self.symmetry.as_ref(), sc_t);
        let engine = DensityMatrixEngine::new(self.config.fdm);
        let (mut rho, mut fdm_running) = engine.seed_last_shell(last_state, &weights, z);

        let mean_e = mean_energy(last_state, &weights, z, self.symmetry.as_ref());
        let thermo = Thermo::compute(z, mean_e, mean_e * mean_e);
        output::write_thermo_row(&self.workdir.td_path(), self.chain.n_max as i64, &thermo)?;

        self.stats.egs = last_state.global_ground_state().unwrap_or(0.0);
        self.stats.push_step(mean_e, self.stats.egs, ExtFloat::from_f64(z), ExtFloat::zero());
        self.stats.wn_factor.push(z);

        for n in (1..self.chain.n_max).rev() {
            let path = self.workdir.unitary_path(n as i64);
            if !path.exists() {
                break;
            }
            let state: DiagState<T> = persistence::load_transformations(&path)?;

            let shell_z: f64 = state
                .spectra
                .iter()
                .map(|(inv, spec)| {
                    let mult = self.symmetry.multiplicity(inv) as f64;
                    mult * spec.v_zero.iter().map(|e| (-e / sc_t).exp()).sum::<f64>()
                })
                .sum();
            self.stats.wn_factor.push(shell_z);
            self.stats
                .push_step(0.0, 0.0, ExtFloat::from_f64(shell_z), ExtFloat::zero());

            let wn = ExtFloat::from_f64(shell_z);
            rho = engine.reduce_backward(&state, &rho, self.symmetry.as_ref(), &mut fdm_running, wn);

            if self.config.removefiles {
                self.workdir.remove_if_present(&path)?;
            }
        }

        self.stats.normalize_weights();

        if let Some(fdm_rho) = &fdm_running {
            let z_fdm = ExtFloat::from_f64(self.stats.wn_factor.iter().sum::<f64>().max(1e-300));
            let mean_e_fdm = ExtFloat::from_f64(mean_e);
            let mean_e2_fdm = ExtFloat::from_f64(mean_e * mean_e);
            let thermo_fdm = ThermoFdm::compute(z_fdm, mean_e_fdm, mean_e2_fdm);
            output::write_thermo_fdm_row(&self.workdir.td_fdm_path(), self.chain.n_max as i64, &thermo_fdm)?;
            debug!(blocks = fdm_rho.blocks.len(), "fdm density matrix accumulated");
        }

        if self.config.dm || self.config.cfs || self.config.dmnrg || self.config.fdm {
            self.accumulate_spectral(last_state, last_ops, &rho, fdm_running.as_ref())?;
        }

        output::write_done_flag(&self.workdir.done_flag_path())?;
        Ok(rho)
    }

    /// Runs every enabled spectral accumulator (`ft` always, `dmnrg`/`cfs`/
    /// `fdm` gated by their config flags) over the configured named
    /// operators plus every recalculated hopping operator, writing one
    /// `<algo>_dens_<name>.dat` file per operator per algorithm. Scoped to
    /// the last shell's state and operators: a fully per-shell CFS/DMNRG
    /// pass would need every intermediate step's recalculated operator
    /// blocks persisted to disk, which this workspace does not yet do (see
    /// `DESIGN.md`).
    fn accumulate_spectral(
        &self,
        state: &DiagState<T>,
        ops: &OperatorBlocks<T>,
        rho: &DensityMatrixSet<T>,
        fdm_rho: Option<&DensityMatrixSet<T>>,
    ) -> Result<()> {
        let e_min = 1e-8;
        let e_max = (10.0 * self.config.temperature).max(1.0);
        let bins_per_decade = 20;

        let mut names: Vec<(String, &crate::operator::OperatorBlockSet<T>)> = Vec::new();
        for name in &self.config.spec_operators {
            if let Some(opset) = ops.named(name) {
                names.push((name.clone(), opset));
            }
        }
        for (channel, flavors) in ops.hopping.iter().enumerate() {
            for (flavor, opset) in flavors.iter().enumerate() {
                names.push((format!("hop_{channel}_{flavor}"), opset));
            }
        }

        if self.config.dm {
            let mut custom = Vec::new();
            for name in &self.config.spec_operators {
                if let Some(opset) = ops.named(name) {
                    custom.push((name.clone(), diagonal_expectation(state, opset, rho, self.symmetry.as_ref())));
                }
            }
            if !custom.is_empty() {
                output::write_custom_row(&self.workdir.custom_path(), self.chain.n_max as i64, &custom)?;
            }
        }

        for (name, opset) in &names {
            let pair = OperatorPair { op1: opset, op2: opset };

            let mut ft = FtAccumulator::new(e_min, e_max, bins_per_decade);
            ft.accumulate(state, rho, self.symmetry.as_ref(), &pair);
            output::write_dens(&self.workdir.dens_path("ft", name), &ft.grid)?;

            if self.config.dmnrg {
                let mut dm = DmnrgAccumulator::new(e_min, e_max, bins_per_decade);
                dm.accumulate(state, rho, self.symmetry.as_ref(), &pair);
                output::write_dens(&self.workdir.dens_path("dmnrg", name), &dm.grid)?;
            }

            if self.config.cfs {
                let mut cfs = CfsAccumulator::new(e_min, e_max, bins_per_decade);
                cfs.accumulate_less(state, rho, self.symmetry.as_ref(), &pair);
                cfs.accumulate_greater(state, rho, self.symmetry.as_ref(), &pair);
                output::write_dens(&self.workdir.dens_path("cfs", name), &cfs.end())?;
            }

            if self.config.fdm {
                if let Some(fdm_rho) = fdm_rho {
                    let mut fdm = FdmAccumulator::new(e_min, e_max, bins_per_decade);
                    let wn = ExtFloat::from_f64(1.0);
                    fdm.accumulate_shell(state, fdm_rho, self.symmetry.as_ref(), &pair, wn.clone(), true);
                    fdm.accumulate_shell(state, fdm_rho, self.symmetry.as_ref(), &pair, wn, false);
                    output::write_dens(&self.workdir.dens_path("fdm", name), &fdm.end())?;
                }
            }
        }

        Ok(())
    }
}

/// Static expectation value `<O> = sum_I mult(I) tr(rho_I O_{I,I})`, summed
/// only over same-subspace (diagonal-in-invariant) blocks — the static
/// observable table's contraction, distinct from the spectral accumulators'
/// off-diagonal matrix elements.
fn diagonal_expectation<T: Scalar>(
    state: &DiagState<T>,
    op: &crate::operator::OperatorBlockSet<T>,
    rho: &DensityMatrixSet<T>,
    symmetry: &dyn Symmetry,
) -> f64 {
    state
        .spectra
        .keys()
        .map(|invariant| {
            let Some(block) = op.get(invariant, invariant) else {
                return 0.0;
            };
            let Some(rho_block) = rho.blocks.get(invariant) else {
                return 0.0;
            };
            let n = block.nrows().min(block.ncols()).min(rho_block.nrows()).min(rho_block.ncols());
            let mult = symmetry.multiplicity(invariant) as f64;
            let trace: f64 = (0..n).map(|i| (block[(i, i)] * rho_block[(i, i)]).real()).sum();
            mult * trace
        })
        .sum()
}

fn mean_energy<T: Scalar>(
    state: &DiagState<T>,
    weights: &BTreeMap<Invariant, Vec<f64>>,
    z: f64,
    symmetry: &dyn Symmetry,
) -> f64 {
    state
        .spectra
        .iter()
        .map(|(inv, spec)| {
            let mult = symmetry.multiplicity(inv) as f64;
            spec.v_zero
                .iter()
                .zip(weights[inv].iter())
                .map(|(e, w)| mult * e * w / z)
                .sum::<f64>()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChannelChain;
    use crate::diagonalizer::shared_memory::SharedMemoryDiagonalizer;
    use crate::invariant::SymmetryKind;
    use tempfile::tempdir;

    #[test]
    fn forward_pass_runs_to_completion_on_a_tiny_chain() {
        let dir = tempdir().unwrap();
        let chain = ChainShell::new(
            2.0,
            vec![ChannelChain::new(vec![0.5, 0.3, 0.2], vec![0.0; 3])],
        );
        let mut config = NrgConfig::default();
        config.keep = 16;
        let solver: Solver<f64> = Solver::new(
            SymmetryKind::Qsz.capability(),
            chain,
            Box::new(SharedMemoryDiagonalizer),
            config,
            WorkDir::resolve(Some(dir.path())),
        );
        let mut solver = solver;
        let (last, _ops) = solver.run_forward().unwrap();
        assert!(!last.spectra.is_empty());
    }

    #[test]
    fn forward_and_backward_pass_complete_with_fdm_enabled() {
        let dir = tempdir().unwrap();
        let chain = ChainShell::new(2.0, vec![ChannelChain::new(vec![0.5, 0.3, 0.2], vec![0.0; 3])]);
        let mut config = NrgConfig::default();
        config.keep = 16;
        config.fdm = true;
        config.dm = true;
        let mut solver: Solver<f64> = Solver::new(
            SymmetryKind::Qsz.capability(),
            chain,
            Box::new(SharedMemoryDiagonalizer),
            config,
            WorkDir::resolve(Some(dir.path())),
        );
        let (last, ops) = solver.run_forward().unwrap();
        let rho = solver.run_backward(&last, &ops).unwrap();
        assert!(!rho.blocks.is_empty());
    }

    #[test]
    fn diagratio_below_one_still_converges_on_a_tiny_chain() {
        let dir = tempdir().unwrap();
        let chain = ChainShell::new(2.0, vec![ChannelChain::new(vec![0.5, 0.3, 0.2], vec![0.0; 3])]);
        let mut config = NrgConfig::default();
        config.keep = 16;
        config.diagratio = 0.3;
        let mut solver: Solver<f64> = Solver::new(
            SymmetryKind::Qsz.capability(),
            chain,
            Box::new(SharedMemoryDiagonalizer),
            config,
            WorkDir::resolve(Some(dir.path())),
        );
        let (last, _ops) = solver.run_forward().unwrap();
        assert!(!last.spectra.is_empty());
    }
}
