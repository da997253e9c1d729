//! Working-directory layout: where per-step blobs, logs, and the final
//! summary files live. Honors `NRG_WORKDIR` the way this corpus's
//! binaries honor an environment override for their output root.

use std::path::{Path, PathBuf};

use crate::error::{NrgError, Result};

#[derive(Clone, Debug)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    /// Resolves the working directory: `NRG_WORKDIR` if set, otherwise
    /// `explicit` if given, otherwise the current directory.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        let root = std::env::var_os("NRG_WORKDIR")
            .map(PathBuf::from)
            .or_else(|| explicit.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));
        WorkDir { root }
    }

    pub fn ensure_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| NrgError::io(self.root.display().to_string(), e))
    }

    pub fn unitary_path(&self, n: i64) -> PathBuf {
        self.root.join(format!("unitary{n}"))
    }

    pub fn rho_path(&self, n: i64) -> PathBuf {
        self.root.join(format!("rho{n}"))
    }

    pub fn rho_fdm_path(&self, n: i64) -> PathBuf {
        self.root.join(format!("rhoFDM{n}"))
    }

    pub fn td_path(&self) -> PathBuf {
        self.root.join("td")
    }

    pub fn td_fdm_path(&self) -> PathBuf {
        self.root.join("tdfdm")
    }

    pub fn custom_path(&self) -> PathBuf {
        self.root.join("custom")
    }

    pub fn custom_fdm_path(&self) -> PathBuf {
        self.root.join("customfdm")
    }

    pub fn annotated_path(&self) -> PathBuf {
        self.root.join("annotated.dat")
    }

    pub fn energies_path(&self) -> PathBuf {
        self.root.join("energies.nrg")
    }

    pub fn subspaces_path(&self) -> PathBuf {
        self.root.join("subspaces.dat")
    }

    pub fn absolute_energies_path(&self) -> PathBuf {
        self.root.join("absolute_energies.dat")
    }

    pub fn done_flag_path(&self) -> PathBuf {
        self.root.join("DONE")
    }

    /// Per-operator spectral-function dump, `<prefix>_<algo>_dens_<name>.dat`.
    pub fn dens_path(&self, algo: &str, name: &str) -> PathBuf {
        self.root.join(format!("{algo}_dens_{name}.dat"))
    }

    /// Removes a per-step blob once the backward pass has consumed it, if
    /// `removefiles` is configured. Missing-file errors are swallowed: a
    /// blob that was never written (e.g. a step with zero kept states) is
    /// not a failure to clean up.
    pub fn remove_if_present(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NrgError::io(path.display().to_string(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unitary_path_is_named_by_step() {
        let wd = WorkDir::resolve(Some(Path::new("/tmp/nrgtest")));
        assert_eq!(wd.unitary_path(3), Path::new("/tmp/nrgtest/unitary3"));
    }
}
