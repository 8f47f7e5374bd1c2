//! Block LU decomposition of the Schur matrix Q.
//!
//! Q is block-cyclic tridiagonal: the two circulant corner blocks generate
//! fill in the last block row of L and the last block column of U, tracked
//! separately as `h` and `v`. A plain tridiagonal solver cannot absorb
//! them; the sweeps below carry them explicitly.

use atoll_math::{ilogdet, logdet, spacetime::set_spacemat, to_first_log_branch, CD, CDMat, CDVec, MathError};

use crate::error::{FermiError, Result};
use crate::matrix::HubbardFermiMatrix;

/// Block LU factors of Q.
///
/// L is unit block-lower with sub-diagonal blocks `l` and a bottom row of
/// wrap blocks `h`; U is block-upper with pre-inverted diagonal blocks
/// `dinv`, super-diagonal blocks `u`, and a rightmost column of wrap
/// blocks `v`. Expected sizes by `nt = dinv.len()`:
///
/// | nt | dinv | u, l | v, h |
/// |----|------|------|------|
/// | 1  | 1    | 0    | 0    |
/// | 2  | 2    | 1    | 0    |
/// | ≥3 | nt   | nt−1 | nt−2 |
#[derive(Debug, Clone)]
pub struct QLu {
    /// Inverses of the diagonal blocks of U.
    pub dinv: Vec<CDMat>,
    /// Super-diagonal blocks of U.
    pub u: Vec<CDMat>,
    /// Rightmost-column wrap blocks of U.
    pub v: Vec<CDMat>,
    /// Sub-diagonal blocks of L.
    pub l: Vec<CDMat>,
    /// Bottom-row wrap blocks of L.
    pub h: Vec<CDMat>,
}

impl QLu {
    fn with_capacity(nt: usize) -> Self {
        Self {
            dinv: Vec::with_capacity(nt),
            u: Vec::with_capacity(nt.saturating_sub(1)),
            v: Vec::with_capacity(nt.saturating_sub(2)),
            l: Vec::with_capacity(nt.saturating_sub(1)),
            h: Vec::with_capacity(nt.saturating_sub(2)),
        }
    }

    /// Number of time slices the factors describe.
    pub fn nt(&self) -> usize {
        self.dinv.len()
    }

    /// Whether the block lists have the sizes the decomposition produces.
    pub fn is_consistent(&self) -> bool {
        let nt = self.dinv.len();
        if nt == 0 {
            return false;
        }
        if self.u.len() != nt - 1 || self.l.len() != nt - 1 {
            return false;
        }
        if nt > 1 && (self.v.len() != nt - 2 || self.h.len() != nt - 2) {
            return false;
        }
        true
    }

    /// Assemble Q back from the factors as a dense matrix.
    ///
    /// Builds L and U explicitly and multiplies; exact up to the re-inversion
    /// of the diagonal blocks. Intended for validation, fails for nt < 2.
    pub fn reconstruct(&self) -> Result<CDMat> {
        let nt = self.nt();
        if nt < 2 {
            return Err(FermiError::NtTooSmall { nt, min: 2 });
        }
        if !self.is_consistent() {
            return Err(FermiError::InconsistentQlu);
        }
        let nx = self.dinv[0].nrows();
        let n = nx * nt;

        let mut umat = CDMat::zeros(n, n);
        for (i, dinv) in self.dinv.iter().enumerate() {
            let d = invert(dinv.clone())?;
            set_spacemat(&mut umat, i, i, nx, &d);
        }
        for (i, u) in self.u.iter().enumerate() {
            set_spacemat(&mut umat, i, i + 1, nx, u);
        }
        for (j, v) in self.v.iter().enumerate() {
            set_spacemat(&mut umat, j, nt - 1, nx, v);
        }

        let mut lmat = CDMat::identity(n, n);
        for (i, l) in self.l.iter().enumerate() {
            set_spacemat(&mut lmat, i + 1, i, nx, l);
        }
        for (j, h) in self.h.iter().enumerate() {
            set_spacemat(&mut lmat, nt - 1, j, nx, h);
        }

        Ok(lmat * umat)
    }
}

fn invert(m: CDMat) -> Result<CDMat> {
    m.try_inverse()
        .ok_or(FermiError::Math(MathError::Singular))
}

/// Block LU decomposition of Q(φ).
pub fn get_qlu(hfm: &HubbardFermiMatrix, phi: &CDVec) -> Result<QLu> {
    match hfm.nt_of(phi)? {
        1 => qlu_nt1(hfm, phi),
        2 => qlu_nt2(hfm, phi),
        _ => qlu_general(hfm, phi),
    }
}

/// nt = 1: Q is a single block P + T⁺ + T⁻.
fn qlu_nt1(hfm: &HubbardFermiMatrix, phi: &CDVec) -> Result<QLu> {
    let d0 = hfm
        .p()
        .to_complex()
        .add(&hfm.tplus(0, phi)?)
        .add(&hfm.tminus(0, phi)?)
        .to_dense();
    let mut lu = QLu::with_capacity(1);
    lu.dinv.push(invert(d0)?);
    Ok(lu)
}

/// nt = 2: the wrapped off-diagonals coincide, no v/h blocks appear.
fn qlu_nt2(hfm: &HubbardFermiMatrix, phi: &CDVec) -> Result<QLu> {
    let p = hfm.p().to_complex().to_dense();
    let mut lu = QLu::with_capacity(2);

    let dinv0 = invert(p.clone())?;
    let u0 = hfm.tplus(0, phi)?.add(&hfm.tminus(0, phi)?).to_dense();
    let l0 = hfm
        .tplus(1, phi)?
        .add(&hfm.tminus(1, phi)?)
        .to_dense()
        * &dinv0;
    let d1 = &p - &l0 * &u0;

    lu.dinv.push(dinv0);
    lu.u.push(u0);
    lu.l.push(l0);
    lu.dinv.push(invert(d1)?);
    Ok(lu)
}

/// General case nt ≥ 3.
fn qlu_general(hfm: &HubbardFermiMatrix, phi: &CDVec) -> Result<QLu> {
    let nt = hfm.nt_of(phi)?;
    let p = hfm.p().to_complex().to_dense();
    let mut lu = QLu::with_capacity(nt);

    // Starting components of d, u, l and the wrap blocks v, h.
    lu.dinv.push(invert(p.clone())?);
    lu.u.push(hfm.tminus(0, phi)?.to_dense());
    lu.l.push(hfm.tplus(1, phi)?.mul_dense(&lu.dinv[0]));
    lu.v.push(hfm.tplus(0, phi)?.to_dense());
    lu.h.push(hfm.tminus(nt - 1, phi)?.mul_dense(&lu.dinv[0]));

    // Regular sweep.
    for i in 1..nt - 2 {
        let dinv = invert(&p - &lu.l[i - 1] * &lu.u[i - 1])?;
        lu.l.push(hfm.tplus(i + 1, phi)?.mul_dense(&dinv));
        lu.h.push(-(&lu.h[i - 1] * &lu.u[i - 1]) * &dinv);
        lu.v.push(-(&lu.l[i - 1] * &lu.v[i - 1]));
        lu.u.push(hfm.tminus(i, phi)?.to_dense());
        lu.dinv.push(dinv);
    }

    // Closing corrections: the wrap blocks fold back into the last two
    // rows and columns.
    lu.dinv
        .push(invert(&p - &lu.l[nt - 3] * &lu.u[nt - 3])?);
    lu.u
        .push(hfm.tminus(nt - 2, phi)?.to_dense() - &lu.l[nt - 3] * &lu.v[nt - 3]);
    lu.l.push(
        (hfm.tplus(nt - 1, phi)?.to_dense() - &lu.h[nt - 3] * &lu.u[nt - 3]) * &lu.dinv[nt - 2],
    );

    let mut d_last = &p - &lu.l[nt - 2] * &lu.u[nt - 2];
    for j in 0..nt - 2 {
        d_last -= &lu.h[j] * &lu.v[j];
    }
    lu.dinv.push(invert(d_last)?);
    Ok(lu)
}

/// Solve Q·x = rhs given the LU factors.
pub fn solve_q_lu(lu: &QLu, rhs: &CDVec) -> Result<CDVec> {
    if !lu.is_consistent() {
        return Err(FermiError::InconsistentQlu);
    }
    let nt = lu.nt();
    let nx = lu.dinv[0].nrows();
    if rhs.len() != nt * nx {
        return Err(FermiError::SizeMismatch {
            len: rhs.len(),
            nx,
        });
    }

    // Forward sweep L·y = rhs.
    let mut y: Vec<CDVec> = Vec::with_capacity(nt);
    y.push(rhs.rows(0, nx).into_owned());
    for i in 1..nt.saturating_sub(1) {
        let yi = rhs.rows(i * nx, nx) - &lu.l[i - 1] * &y[i - 1];
        y.push(yi);
    }
    if nt > 1 {
        let mut last = rhs.rows((nt - 1) * nx, nx) - &lu.l[nt - 2] * &y[nt - 2];
        for j in 0..nt - 2 {
            last -= &lu.h[j] * &y[j];
        }
        y.push(last);
    }

    // Backward sweep U·x = y.
    let mut x = vec![CDVec::zeros(nx); nt];
    x[nt - 1] = &lu.dinv[nt - 1] * &y[nt - 1];
    if nt > 1 {
        x[nt - 2] = &lu.dinv[nt - 2] * (&y[nt - 2] - &lu.u[nt - 2] * &x[nt - 1]);
        for i in (0..nt - 2).rev() {
            x[i] = &lu.dinv[i] * (&y[i] - &lu.u[i] * &x[i + 1] - &lu.v[i] * &x[nt - 1]);
        }
    }

    let mut out = CDVec::zeros(nt * nx);
    for (i, xi) in x.iter().enumerate() {
        out.rows_mut(i * nx, nx).copy_from(xi);
    }
    Ok(out)
}

/// Solve Q(φ)·x = rhs.
pub fn solve_q(hfm: &HubbardFermiMatrix, phi: &CDVec, rhs: &CDVec) -> Result<CDVec> {
    solve_q_lu(&get_qlu(hfm, phi)?, rhs)
}

/// `log det Q` from existing LU factors.
///
/// The diagonal blocks are stored pre-inverted, hence the minus sign.
pub fn logdet_q_lu(lu: &QLu) -> Result<CD> {
    if !lu.is_consistent() {
        return Err(FermiError::InconsistentQlu);
    }
    let mut ld = CD::new(0.0, 0.0);
    for dinv in &lu.dinv {
        ld -= logdet(dinv)?;
    }
    Ok(to_first_log_branch(ld))
}

/// Consuming variant of [`logdet_q_lu`]; decomposes the blocks in place.
pub fn ilogdet_q(lu: QLu) -> Result<CD> {
    if !lu.is_consistent() {
        return Err(FermiError::InconsistentQlu);
    }
    let mut ld = CD::new(0.0, 0.0);
    for dinv in lu.dinv {
        ld -= ilogdet(dinv)?;
    }
    Ok(to_first_log_branch(ld))
}

/// `log det Q(φ)` via the block LU decomposition.
pub fn logdet_q(hfm: &HubbardFermiMatrix, phi: &CDVec) -> Result<CD> {
    ilogdet_q(get_qlu(hfm, phi)?)
}
