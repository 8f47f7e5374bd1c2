//! Complex log-determinants and the symmetric matrix exponential.

use std::f64::consts::PI;

use crate::error::{MathError, Result};
use crate::{CD, CDMat, DMat};

/// Project a complex number onto the first branch of the logarithm.
///
/// The real part is preserved; the imaginary part is shifted by a multiple
/// of 2π into `(-π, π]`.
pub fn to_first_log_branch(z: CD) -> CD {
    CD::new(z.re, PI - (PI - z.im).rem_euclid(2.0 * PI))
}

/// Compute `log(det(a))` via an LU decomposition with partial pivoting.
///
/// The determinant is `det(P)·Π U_ii` with unit-lower L, so the log is the
/// sum of the logs of the U diagonal plus `iπ` when the permutation is
/// odd. The result is projected onto the first branch of the logarithm.
pub fn logdet(a: &CDMat) -> Result<CD> {
    ilogdet(a.clone())
}

/// Consuming variant of [`logdet`].
///
/// Takes the matrix by value and decomposes it in place; use this when the
/// caller has no further use for `a`.
pub fn ilogdet(a: CDMat) -> Result<CD> {
    if !a.is_square() {
        return Err(MathError::NonSquare {
            rows: a.nrows(),
            cols: a.ncols(),
        });
    }

    let n = a.nrows();
    let lu = a.lu();
    // Each recorded pivot is one transposition.
    let odd_permutation = lu.p().len() % 2 == 1;

    let u = lu.u();
    let mut res = CD::new(0.0, 0.0);
    for i in 0..n {
        let pivot = u[(i, i)];
        if pivot == CD::new(0.0, 0.0) {
            return Err(MathError::Singular);
        }
        res += pivot.ln();
    }
    if odd_permutation {
        res += CD::new(0.0, PI);
    }
    Ok(to_first_log_branch(res))
}

/// Matrix exponential of a real symmetric matrix.
///
/// Uses the eigendecomposition `a = V·Λ·Vᵀ`, so `exp(a) = V·exp(Λ)·Vᵀ`
/// exactly (up to the accuracy of the eigensolver). Only valid for
/// symmetric input; the decomposition reads the lower triangle.
pub fn expm_sym(a: &DMat) -> Result<DMat> {
    if !a.is_square() {
        return Err(MathError::NonSquare {
            rows: a.nrows(),
            cols: a.ncols(),
        });
    }

    let eig = a.clone().symmetric_eigen();
    let exp_diag = DMat::from_diagonal(&eig.eigenvalues.map(f64::exp));
    Ok(&eig.eigenvectors * exp_diag * eig.eigenvectors.transpose())
}
