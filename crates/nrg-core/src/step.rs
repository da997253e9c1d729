//! Per-iteration bookkeeping tag: which Wilson-chain site this is, whether
//! it is the chain's last, and the direction the solver is currently
//! traversing it in.

/// The solver runs the same chain twice: once forward to build up the
/// truncated spectra (and, for FDM/DMNRG, save the transformation
/// matrices), once backward to accumulate spectral functions using the
/// saved density matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Identifies one Wilson-chain iteration within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepTag {
    pub n: usize,
    pub n_max: usize,
    pub direction: Direction,
}

impl StepTag {
    pub fn new(n: usize, n_max: usize, direction: Direction) -> Self {
        StepTag {
            n,
            n_max,
            direction,
        }
    }

    pub fn is_first(&self) -> bool {
        self.n == 0
    }

    pub fn is_last(&self) -> bool {
        self.n == self.n_max
    }

    /// Whether this step's density matrix / spectrum must be retained on
    /// disk for the backward pass: every forward step's transformation
    /// matrix is needed once during the backward sweep.
    pub fn needs_persistence(&self, direction: Direction) -> bool {
        direction == Direction::Backward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_step_is_detected() {
        let step = StepTag::new(10, 10, Direction::Forward);
        assert!(step.is_last());
        assert!(!step.is_first());
    }
}
