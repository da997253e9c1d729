//! Per-subspace eigenspectrum, with truncation state and the column-block
//! decomposition recalculation kernels need for contiguous-tile GEMM
//! contiguous-tile GEMM.

use crate::invariant::Invariant;
use crate::scalar::{Matrix, Scalar};

/// One contiguous run of columns in a subspace's eigenvector matrix that
/// came from a single ancestor invariant's basis block in the previous
/// step's combined Hamiltonian.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnBlock {
    pub ancestor: Invariant,
    pub offset: usize,
    pub len: usize,
}

/// Eigenpairs for one invariant subspace at one step.
///
/// Eigenvectors are stored as an `rows = stored eigenpairs, cols = basis
/// size` matrix: rows are eigenpairs, columns are basis size.
#[derive(Clone, Debug)]
pub struct Spectrum<T: Scalar> {
    /// Ascending, length = `stored`.
    pub v_orig: Vec<f64>,
    /// `stored x dim` matrix; row `r` is eigenpair `r`'s coefficients over
    /// the combined ancestor basis.
    pub eigenvectors: Matrix<T>,
    /// Ground-state energy subtracted to produce `v_zero` (this step's
    /// `Egs`, not the global one).
    pub egs: f64,
    /// `v_orig - egs`, i.e. shifted so the running minimum is (near) zero.
    pub v_zero: Vec<f64>,
    /// Absolute energy in three running scales (grand-canonical,
    /// ground-state-referenced, and step-N-referenced).
    pub abs_e: Vec<f64>,
    pub abs_e_g: Vec<f64>,
    pub abs_e_n: Vec<f64>,
    /// Number of eigenpairs kept after truncation. `kept <= stored <= dim`.
    pub kept: usize,
    /// Basis dimension of the block Hamiltonian this spectrum diagonalized
    /// (`computed`; may exceed `stored` when
    /// `diagratio < 1`).
    pub dim: usize,
    /// Column blocks, populated once `split_columns` has been called.
    pub blocks: Vec<ColumnBlock>,
}

impl<T: Scalar> Spectrum<T> {
    pub fn new(v_orig: Vec<f64>, eigenvectors: Matrix<T>, dim: usize) -> Self {
        let stored = v_orig.len();
        debug_assert_eq!(eigenvectors.nrows(), stored);
        debug_assert_eq!(eigenvectors.ncols(), dim);
        debug_assert!(
            v_orig.windows(2).all(|w| w[0] <= w[1] + 1e-9),
            "eigenvalues must be weakly increasing"
        );
        Spectrum {
            v_orig,
            eigenvectors,
            egs: 0.0,
            v_zero: Vec::new(),
            abs_e: Vec::new(),
            abs_e_g: Vec::new(),
            abs_e_n: Vec::new(),
            kept: stored,
            dim,
            blocks: Vec::new(),
        }
    }

    pub fn stored(&self) -> usize {
        self.v_orig.len()
    }

    /// Subtract the per-subspace ground-state energy and populate `v_zero`.
    /// `egs` should be the *global* ground state across all subspaces at
    /// this step so that `min v_zero == 0` across all subspaces.
    pub fn subtract_ground_state(&mut self, egs: f64) {
        self.egs = egs;
        self.v_zero = self.v_orig.iter().map(|e| e - egs).collect();
        debug_assert!(
            self.v_zero.iter().all(|v| *v >= -1e-9),
            "v_zero must be non-negative after ground-state subtraction"
        );
    }

    /// Record the three absolute-energy scales; called once per step after
    /// the running accumulators in `Stats` are updated.
    pub fn set_absolute_energies(&mut self, abs_e: Vec<f64>, abs_e_g: Vec<f64>, abs_e_n: Vec<f64>) {
        debug_assert_eq!(abs_e.len(), self.stored());
        debug_assert_eq!(abs_e_g.len(), self.stored());
        debug_assert_eq!(abs_e_n.len(), self.stored());
        self.abs_e = abs_e;
        self.abs_e_g = abs_e_g;
        self.abs_e_n = abs_e_n;
    }

    /// Partition the eigenvector columns into contiguous per-ancestor
    /// blocks. `layout` gives `(ancestor, len)` pairs in the same order the
    /// block Hamiltonian was assembled in (a prefix-sum block layout).
    pub fn split_columns(&mut self, layout: &[(Invariant, usize)]) {
        let mut offset = 0usize;
        let mut blocks = Vec::with_capacity(layout.len());
        for (ancestor, len) in layout {
            blocks.push(ColumnBlock {
                ancestor: ancestor.clone(),
                offset,
                len: *len,
            });
            offset += len;
        }
        debug_assert_eq!(offset, self.eigenvectors.ncols());
        self.blocks = blocks;
    }

    /// The eigenvector sub-matrix for ancestor block `ancestor`, restricted
    /// to the first `rows` stored eigenpairs (pass `self.stored()` for
    /// strategy `all`, `self.kept` for strategy `kept`).
    pub fn block_columns(&self, ancestor: &Invariant, rows: usize) -> Option<Matrix<T>> {
        let block = self.blocks.iter().find(|b| &b.ancestor == ancestor)?;
        let rows = rows.min(self.stored());
        Some(
            self.eigenvectors
                .view((0, block.offset), (rows, block.len))
                .into_owned(),
        )
    }
}
