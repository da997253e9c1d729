//! Wilson chain description: per-site hopping amplitudes and on-site
//! energies for every channel, read from the discretization front end
//! structures.

/// One channel's Wilson-chain coefficients, indexed by site.
#[derive(Clone, Debug)]
pub struct ChannelChain {
    /// `xi[n]`: hopping amplitude between site `n` and site `n+1`.
    pub xi: Vec<f64>,
    /// `eps[n]`: on-site energy at site `n` (zero for the strict Wilson
    /// chain, non-zero once z-averaging or band-asymmetric discretization
    /// shifts it).
    pub eps: Vec<f64>,
}

impl ChannelChain {
    pub fn new(xi: Vec<f64>, eps: Vec<f64>) -> Self {
        debug_assert_eq!(xi.len(), eps.len());
        ChannelChain { xi, eps }
    }

    pub fn len(&self) -> usize {
        self.xi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xi.is_empty()
    }
}

/// A full Wilson chain: one `ChannelChain` per conduction channel, shared
/// discretization parameter `lambda`, and the number of sites actually
/// iterated (`n_max`).
#[derive(Clone, Debug)]
pub struct ChainShell {
    pub lambda: f64,
    pub channels: Vec<ChannelChain>,
    pub n_max: usize,
    /// Discretization substeps folded into each site (z-averaging); `1`
    /// for the plain Wilson chain.
    pub substeps: usize,
}

impl ChainShell {
    pub fn new(lambda: f64, channels: Vec<ChannelChain>) -> Self {
        let n_max = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        ChainShell {
            lambda,
            channels,
            n_max,
            substeps: 1,
        }
    }

    pub fn with_substeps(mut self, substeps: usize) -> Self {
        self.substeps = substeps.max(1);
        self
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    /// Characteristic energy scale at step `n`, `lambda^(-n/2)` in the
    /// standard Wilson convention, used to convert stored "reduced"
    /// energies into absolute ones.
    pub fn energy_scale(&self, n: usize) -> f64 {
        self.lambda.powf(-(n as f64) / 2.0)
    }

    /// Per-step diagonal rescale factor: `sqrt(lambda)` for the plain
    /// chain, `lambda^(1/(2*substeps))` when substeps fold multiple
    /// discretization points into one iteration.
    pub fn rescale_factor(&self) -> f64 {
        if self.substeps <= 1 {
            self.lambda.sqrt()
        } else {
            self.lambda.powf(1.0 / (2.0 * self.substeps as f64))
        }
    }
}
