//! Dense kernel seam for the force hot path.
//!
//! The single-determinant force spends its time in `nx×nx` dense complex
//! products plus one inversion; both go through [`DenseOps`] so an
//! accelerator backend can be swapped in without touching the algorithm
//! layer. Backends must agree with [`CpuOps`] up to floating-point
//! rounding.

use crate::error::{MathError, Result};
use crate::CDMat;

/// Dense complex kernels used by the force algorithms.
pub trait DenseOps: Send + Sync {
    /// Dense complex product `a * b`.
    fn matmul(&self, a: &CDMat, b: &CDMat) -> CDMat;

    /// Inverse of a square matrix via LU with partial pivoting.
    ///
    /// The default stays on the CPU; pivoted LU does not pay off on
    /// accelerator backends at the block sizes this engine works with.
    fn inverse(&self, a: &CDMat) -> Result<CDMat> {
        a.clone().try_inverse().ok_or(MathError::Singular)
    }
}

/// Reference implementation on top of nalgebra.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuOps;

impl DenseOps for CpuOps {
    fn matmul(&self, a: &CDMat, b: &CDMat) -> CDMat {
        a * b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CD;

    #[test]
    fn cpu_matmul_matches_operator() {
        let a = CDMat::from_fn(3, 3, |i, j| CD::new(i as f64, j as f64));
        let b = CDMat::from_fn(3, 3, |i, j| CD::new(j as f64 - 1.0, i as f64));
        assert_eq!(CpuOps.matmul(&a, &b), &a * &b);
    }

    #[test]
    fn cpu_inverse_of_identity() {
        let id = CDMat::identity(4, 4);
        assert_eq!(CpuOps.inverse(&id).unwrap(), id);
    }

    #[test]
    fn cpu_inverse_rejects_singular() {
        let z = CDMat::zeros(2, 2);
        assert_eq!(CpuOps.inverse(&z), Err(MathError::Singular));
    }
}
