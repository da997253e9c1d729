//! A tiny Wilson chain runs end-to-end without error and produces a
//! plausibly shaped final state.

use nrg_core::chain::{ChainShell, ChannelChain};
use nrg_core::config::NrgConfig;
use nrg_core::diagonalizer::shared_memory::SharedMemoryDiagonalizer;
use nrg_core::invariant::SymmetryKind;
use nrg_core::solver::Solver;
use nrg_core::workdir::WorkDir;

#[test]
fn three_site_chain_completes_forward_and_backward_passes() {
    let dir = tempfile::tempdir().unwrap();
    let chain = ChainShell::new(
        2.0,
        vec![ChannelChain::new(vec![0.5, 0.3, 0.2], vec![0.0; 3])],
    );
    let mut config = NrgConfig::default();
    config.keep = 32;
    config.n_max = chain.n_max as i64;

    let mut solver: Solver<f64> = Solver::new(
        SymmetryKind::Qsz.capability(),
        chain,
        Box::new(SharedMemoryDiagonalizer),
        config,
        WorkDir::resolve(Some(dir.path())),
    );

    let (last, ops) = solver.run_forward().expect("forward pass should complete");
    assert!(!last.spectra.is_empty());
    for spec in last.spectra.values() {
        assert!(spec.kept <= spec.stored());
        assert!(spec.v_zero.iter().all(|v| *v >= -1e-6));
    }

    let rho = solver
        .run_backward(&last, &ops)
        .expect("backward pass should complete");
    assert!(!rho.blocks.is_empty());
    assert!(dir.path().join("DONE").exists());
}
