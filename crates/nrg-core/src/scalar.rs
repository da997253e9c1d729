//! The scalar-kind tag: real vs complex differs
//! only in the type of matrix entries and coefficients, so the whole engine
//! is generic over a single `Scalar` type parameter instead of duplicating
//! real/complex code paths.

use nalgebra::ComplexField;
use num_complex::Complex64;

/// Dense matrices and vectors use `nalgebra`'s general types so both the
/// real (`f64`) and complex (`Complex64`) instantiations share one code
/// path.
pub type Matrix<T> = nalgebra::DMatrix<T>;
pub type Vector<T> = nalgebra::DVector<T>;

/// Bound shared by every generic engine component. `RealField = f64`
/// pins both instantiations to double precision, matching the rest of the
/// corpus's numeric crates.
pub trait Scalar:
    ComplexField<RealField = f64> + Copy + Send + Sync + std::fmt::Debug + 'static
{
    /// `true` for the complex instantiation; lets call sites (e.g. the
    /// input-file reader's `COMPLEX` flag check) assert the configured mode
    /// matches the type parameter actually in use.
    const IS_COMPLEX: bool;
}

impl Scalar for f64 {
    const IS_COMPLEX: bool = false;
}

impl Scalar for Complex64 {
    const IS_COMPLEX: bool = true;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_flags_are_distinct() {
        assert!(!f64::IS_COMPLEX);
        assert!(Complex64::IS_COMPLEX);
    }
}
