//! CLI driver for the NRG engine.
//!
//! Subcommands:
//!  - `run`: assemble a toy single-channel Wilson chain from CLI-provided
//!    parameters, run the forward and backward passes, and print the final
//!    thermodynamics.
//!
//! This intentionally does not parse the legacy `[param]` key/value grammar
//! or any symbolic model description — those remain external collaborators.
//! Configuration here goes through `nrg_core::config::NrgConfig`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use nrg_core::chain::{ChainShell, ChannelChain};
use nrg_core::config::{DiagMode, NrgConfig};
use nrg_core::diagonalizer::shared_memory::SharedMemoryDiagonalizer;
use nrg_core::diagonalizer::Diagonalizer;
use nrg_core::invariant::SymmetryKind;
use nrg_core::solver::Solver;
use nrg_core::workdir::WorkDir;

#[derive(Parser)]
#[command(name = "nrg", about = "Wilson-chain NRG solver", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single-channel Wilson chain to completion.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Symmetry to use: `QS` or `QSZ`.
    #[arg(long, default_value = "QSZ")]
    symmetry: String,

    /// Wilson discretization parameter.
    #[arg(long, default_value_t = 2.0)]
    lambda: f64,

    /// Number of Wilson-chain sites.
    #[arg(long, default_value_t = 10)]
    n_max: usize,

    /// Number of states to keep per step.
    #[arg(long, default_value_t = 200)]
    keep: usize,

    /// Run temperature.
    #[arg(long, default_value_t = 1e-4)]
    temperature: f64,

    /// Working directory for persisted per-step blobs and summary files.
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Optional config file (TOML/JSON/YAML) layered under the CLI flags.
    #[arg(long)]
    config: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
    }
}

/// Picks the diagonalization backend named by `config.diag_mode`.
/// `Distributed` needs the `mpi-backend` feature built in; without it this
/// returns an error rather than silently falling back to shared-memory, so
/// a misconfigured run fails loudly instead of quietly using fewer ranks
/// than requested.
fn select_diagonalizer(mode: DiagMode) -> Result<Box<dyn Diagonalizer<f64>>> {
    match mode {
        DiagMode::SharedMemory => Ok(Box::new(SharedMemoryDiagonalizer)),
        DiagMode::Distributed => {
            #[cfg(feature = "mpi-backend")]
            {
                use nrg_core::diagonalizer::distributed::DistributedDiagonalizer;

                let universe = mpi::initialize()
                    .ok_or_else(|| anyhow::anyhow!("failed to initialize MPI universe"))?;
                // Leaked for the process lifetime: the diagonalizer is
                // boxed as `'static` and MPI has no well-defined teardown
                // point short of process exit anyway.
                let universe = Box::leak(Box::new(universe));
                let world = Box::leak(Box::new(universe.world()));
                Ok(Box::new(DistributedDiagonalizer { world }))
            }
            #[cfg(not(feature = "mpi-backend"))]
            {
                anyhow::bail!("diag_mode=Distributed requires the mpi-backend feature")
            }
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    let symmetry = SymmetryKind::parse(&args.symmetry)
        .with_context(|| format!("unsupported symmetry {:?}", args.symmetry))?
        .capability();

    let mut config = match &args.config {
        Some(path) => NrgConfig::load(Some(path)).context("loading config file")?,
        None => NrgConfig::default(),
    };
    config.lambda = args.lambda;
    config.n_max = args.n_max as i64;
    config.keep = args.keep;
    config.temperature = args.temperature;
    config.validate().context("validating configuration")?;

    let xi: Vec<f64> = (0..=args.n_max)
        .map(|n| config.lambda.powf(-(n as f64) / 2.0))
        .collect();
    let chain = ChainShell::new(
        config.lambda,
        vec![ChannelChain::new(xi.clone(), vec![0.0; xi.len()])],
    )
    .with_substeps(config.substeps);

    let diagonalizer = select_diagonalizer(config.diag_mode)?;
    let workdir = WorkDir::resolve(args.workdir.as_deref());
    let mut solver: Solver<f64> = Solver::new(symmetry, chain, diagonalizer, config, workdir);

    let progress = ProgressBar::new(args.n_max as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} steps")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let (last_state, last_ops) = solver.run_forward().context("forward pass")?;
    progress.finish_and_clear();

    let rho = solver
        .run_backward(&last_state, &last_ops)
        .context("backward pass")?;

    println!("NRG run complete.");
    println!("  final subspaces: {}", last_state.spectra.len());
    println!("  density matrix blocks: {}", rho.blocks.len());

    Ok(())
}
