//! Plain-text summary files written alongside the binary persistence
//! blobs: thermodynamics tables (`td`/`tdfdm`), per-step energy/subspace
//! dumps, and the `DONE` completion flag a driver can poll for.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::diag_state::DiagState;
use crate::error::{NrgError, Result};
use crate::invariant::Symmetry;
use crate::scalar::Scalar;
use crate::spectral_engine::LogGrid;
use crate::stats::{Thermo, ThermoFdm};

/// Appends one `(step, thermo)` row to a `td`/`tdfdm`-style table, creating
/// the file with a header on the first call.
pub fn write_thermo_row(path: &Path, step: i64, thermo: &Thermo) -> Result<()> {
    let is_new = !path.exists();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| NrgError::io(path.display().to_string(), e))?;
    if is_new {
        writeln!(file, "# step Z <E> <E^2> C F S")
            .map_err(|e| NrgError::io(path.display().to_string(), e))?;
    }
    writeln!(
        file,
        "{step} {} {} {} {} {} {}",
        thermo.z, thermo.mean_e, thermo.mean_e2, thermo.heat_capacity, thermo.free_energy, thermo.entropy
    )
    .map_err(|e| NrgError::io(path.display().to_string(), e))
}

/// Appends one `(step, thermo_fdm)` row to a `tdfdm`-style table.
pub fn write_thermo_fdm_row(path: &Path, step: i64, thermo: &ThermoFdm) -> Result<()> {
    let is_new = !path.exists();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| NrgError::io(path.display().to_string(), e))?;
    if is_new {
        writeln!(file, "# step Z_fdm <E>_fdm C_fdm F_fdm S_fdm")
            .map_err(|e| NrgError::io(path.display().to_string(), e))?;
    }
    writeln!(
        file,
        "{step} {} {} {} {} {}",
        thermo.z_fdm.to_f64(),
        thermo.mean_e_fdm.to_f64(),
        thermo.heat_capacity_fdm.to_f64(),
        thermo.free_energy_fdm.to_f64(),
        thermo.entropy_fdm.to_f64(),
    )
    .map_err(|e| NrgError::io(path.display().to_string(), e))
}

/// Appends one row of named static expectation values to a `custom`/
/// `customfdm`-style table.
pub fn write_custom_row(path: &Path, step: i64, values: &[(String, f64)]) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| NrgError::io(path.display().to_string(), e))?;
    write!(file, "{step}").map_err(|e| NrgError::io(path.display().to_string(), e))?;
    for (name, value) in values {
        write!(file, " {name}={value}").map_err(|e| NrgError::io(path.display().to_string(), e))?;
    }
    writeln!(file).map_err(|e| NrgError::io(path.display().to_string(), e))
}

/// Dumps one spectral accumulator's log-spaced grid to a per-operator
/// `<algo>_dens_<name>.dat` file: `energy weight` pairs, negative branch
/// first, then the zero bin, then the positive branch.
pub fn write_dens(path: &Path, grid: &LogGrid) -> Result<()> {
    let mut file = File::create(path).map_err(|e| NrgError::io(path.display().to_string(), e))?;
    writeln!(file, "# energy weight").map_err(|e| NrgError::io(path.display().to_string(), e))?;
    for (i, w) in grid.negative.iter().enumerate().rev() {
        if *w == 0.0 {
            continue;
        }
        let e = -grid.e_min * 10f64.powf(i as f64 / grid.bins_per_decade as f64);
        writeln!(file, "{e} {w}").map_err(|e2| NrgError::io(path.display().to_string(), e2))?;
    }
    if grid.zero != 0.0 {
        writeln!(file, "0 {}", grid.zero).map_err(|e| NrgError::io(path.display().to_string(), e))?;
    }
    for (i, w) in grid.positive.iter().enumerate() {
        if *w == 0.0 {
            continue;
        }
        let e = grid.e_min * 10f64.powf(i as f64 / grid.bins_per_decade as f64);
        writeln!(file, "{e} {w}").map_err(|e2| NrgError::io(path.display().to_string(), e2))?;
    }
    Ok(())
}

/// Dumps every subspace's absolute energy (`v_zero` converted back through
/// the chain's energy scale at this step) to `absolute_energies.dat`,
/// tagging each eigenpair kept ("K") or discarded ("D").
pub fn write_absolute_energies<T: Scalar>(
    path: &Path,
    step: i64,
    state: &DiagState<T>,
    scale: f64,
) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| NrgError::io(path.display().to_string(), e))?;
    writeln!(file, "# step {step} scale {scale}").map_err(|e| NrgError::io(path.display().to_string(), e))?;
    for (invariant, spec) in &state.spectra {
        for (i, e) in spec.v_zero.iter().enumerate() {
            let tag = if i < spec.kept { "K" } else { "D" };
            writeln!(file, "{invariant} {} {tag}", e * scale)
                .map_err(|e2| NrgError::io(path.display().to_string(), e2))?;
        }
    }
    Ok(())
}

/// Dumps every subspace's quantum numbers and multiplicity alongside its
/// eigenvalues to `annotated.dat`, one step's block per call.
pub fn write_annotated<T: Scalar>(
    path: &Path,
    step: i64,
    state: &DiagState<T>,
    symmetry: &dyn Symmetry,
) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| NrgError::io(path.display().to_string(), e))?;
    writeln!(file, "# step {step}").map_err(|e| NrgError::io(path.display().to_string(), e))?;
    for (invariant, spec) in &state.spectra {
        let mult = symmetry.multiplicity(invariant);
        for (i, e) in spec.v_zero.iter().enumerate() {
            let tag = if i < spec.kept { "K" } else { "D" };
            writeln!(file, "{invariant} mult={mult} {e} {tag}")
                .map_err(|e2| NrgError::io(path.display().to_string(), e2))?;
        }
    }
    Ok(())
}

/// Dumps every subspace's kept/total/dim triple for one step, in
/// deterministic invariant order, matching `subspaces.dat`'s per-step
/// block layout.
pub fn write_subspaces<T: Scalar>(path: &Path, step: i64, state: &DiagState<T>) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| NrgError::io(path.display().to_string(), e))?;
    writeln!(file, "# step {step}").map_err(|e| NrgError::io(path.display().to_string(), e))?;
    for (invariant, spec) in &state.spectra {
        writeln!(file, "{invariant} {} {} {}", spec.kept, spec.stored(), spec.dim)
            .map_err(|e| NrgError::io(path.display().to_string(), e))?;
    }
    Ok(())
}

/// Dumps every subspace's eigenvalue list for one step to `energies.nrg`.
pub fn write_energies<T: Scalar>(path: &Path, step: i64, state: &DiagState<T>) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| NrgError::io(path.display().to_string(), e))?;
    writeln!(file, "# step {step}").map_err(|e| NrgError::io(path.display().to_string(), e))?;
    for (invariant, spec) in &state.spectra {
        write!(file, "{invariant}").map_err(|e| NrgError::io(path.display().to_string(), e))?;
        for e in &spec.v_zero {
            write!(file, " {e}").map_err(|e2| NrgError::io(path.display().to_string(), e2))?;
        }
        writeln!(file).map_err(|e| NrgError::io(path.display().to_string(), e))?;
    }
    Ok(())
}

/// Writes the `DONE` flag file marking a completed run.
pub fn write_done_flag(path: &Path) -> Result<()> {
    File::create(path)
        .map_err(|e| NrgError::io(path.display().to_string(), e))?
        .write_all(b"done\n")
        .map_err(|e| NrgError::io(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn thermo_row_writes_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("td");
        let thermo = Thermo::compute(1.0, 0.0, 0.0);
        write_thermo_row(&path, 0, &thermo).unwrap();
        write_thermo_row(&path, 1, &thermo).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().filter(|l| l.starts_with('#')).count(), 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn dens_dump_skips_empty_bins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ft_dens_test.dat");
        let mut grid = LogGrid::new(1e-8, 10.0, 10);
        grid.add_delta(1.0, 2.0);
        write_dens(&path, &grid).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().filter(|l| !l.starts_with('#')).count(), 1);
    }
}
