//! Typed run configuration, replacing the legacy `[param]` key/value
//! grammar (an external collaborator, not reimplemented here) with a
//! `serde`-deserializable struct loadable from TOML/JSON/environment
//! through the `config` crate's layered builder.

use serde::{Deserialize, Serialize};

use crate::error::{NrgError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    All,
    Kept,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagMode {
    SharedMemory,
    Distributed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NrgConfig {
    /// Wilson discretization parameter, must be `> 1`.
    pub lambda: f64,
    /// Number of Wilson-chain sites to iterate.
    pub n_max: i64,
    /// Target number of states kept per step.
    pub keep: usize,
    /// Energy-based keep cutoff, in units of the current shell's scale.
    pub keep_energy: Option<f64>,
    /// Minimum number of states to always keep, overriding `keep_energy`.
    pub keep_min: usize,
    /// Degeneracy gap tolerance (`eps_sg`): the truncation cut extends past
    /// `nrkeep` while the gap to the next eigenvalue stays at or below this
    /// value, splitting a near-degenerate manifold.
    pub safeguard: f64,
    /// Hard cap on how many extra states the safeguard may add.
    pub safeguard_max: usize,
    /// Run temperature, in units of the band half-width.
    pub temperature: f64,
    /// `beta_bar` parameter controlling the FDM/DM-NRG broadening scale.
    pub beta_bar: f64,
    /// Discretization substeps per site (z-averaging / improved
    /// discretization), `1` for the plain Wilson chain.
    pub substeps: usize,
    pub strategy: Strategy,
    pub diag_mode: DiagMode,
    /// Initial fraction of each subspace's spectrum the diagonalizer is
    /// asked to compute, in `(0, 1]`. `1.0` always does a full solve.
    pub diagratio: f64,
    /// Multiplier applied to `diagratio` on each retry after a step reports
    /// insufficient states.
    pub restart_factor: f64,
    pub dm: bool,
    pub cfs: bool,
    pub dmnrg: bool,
    pub fdm: bool,
    /// Named operator sets to accumulate spectral functions for.
    pub spec_operators: Vec<String>,
    /// Stop the run early after this many steps (0 = run to `n_max`).
    pub stopafter: usize,
    /// Delete per-step transformation/density-matrix blobs once consumed.
    pub removefiles: bool,
}

impl Default for NrgConfig {
    fn default() -> Self {
        NrgConfig {
            lambda: 2.0,
            n_max: 50,
            keep: 1000,
            keep_energy: None,
            keep_min: 0,
            safeguard: 1e-9,
            safeguard_max: 10,
            temperature: 1e-4,
            beta_bar: 1.0,
            substeps: 1,
            strategy: Strategy::Kept,
            diag_mode: DiagMode::SharedMemory,
            diagratio: 1.0,
            restart_factor: 3.0,
            dm: false,
            cfs: false,
            dmnrg: false,
            fdm: false,
            spec_operators: Vec::new(),
            stopafter: 0,
            removefiles: false,
        }
    }
}

impl NrgConfig {
    /// Loads configuration from `path` (TOML/JSON/YAML by extension),
    /// layered under defaults and overridden by `NRG_`-prefixed environment
    /// variables, matching this corpus's `config::Config::builder()` usage.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("NRG").separator("_"));
        let settings = builder.build().map_err(config_err)?;
        let cfg: NrgConfig = settings.try_deserialize().map_err(config_err)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lambda <= 1.0 {
            return Err(NrgError::CorruptInput(format!(
                "lambda must be > 1, got {}",
                self.lambda
            )));
        }
        if self.n_max < 0 {
            return Err(NrgError::CorruptInput(format!(
                "n_max must be >= 0, got {}",
                self.n_max
            )));
        }
        if self.substeps == 0 {
            return Err(NrgError::CorruptInput("substeps must be >= 1".into()));
        }
        if self.safeguard < 0.0 {
            return Err(NrgError::CorruptInput(format!(
                "safeguard must be >= 0, got {}",
                self.safeguard
            )));
        }
        if !(self.diagratio > 0.0 && self.diagratio <= 1.0) {
            return Err(NrgError::CorruptInput(format!(
                "diagratio must be in (0, 1], got {}",
                self.diagratio
            )));
        }
        if self.restart_factor <= 1.0 {
            return Err(NrgError::CorruptInput(format!(
                "restart_factor must be > 1, got {}",
                self.restart_factor
            )));
        }
        if self.beta_bar <= 0.0 {
            return Err(NrgError::CorruptInput(format!(
                "beta_bar must be > 0, got {}",
                self.beta_bar
            )));
        }
        Ok(())
    }
}

fn config_err(e: config::ConfigError) -> NrgError {
    NrgError::CorruptInput(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(NrgConfig::default().validate().is_ok());
    }

    #[test]
    fn lambda_at_or_below_one_is_rejected() {
        let mut cfg = NrgConfig::default();
        cfg.lambda = 1.0;
        assert!(cfg.validate().is_err());
    }
}
