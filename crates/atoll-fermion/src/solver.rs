//! Single-determinant route: `log det M` and solving M·x = b.
//!
//! Both work through the cyclic reduction `det M = det K^Nt · det(I + A)`
//! with `A` a product of `K⁻¹·F(t)` factors over the time slices. The
//! route is numerically unstable away from half filling, so a non-zero
//! chemical potential is refused up front.

use rayon::prelude::*;

use atoll_math::{ilogdet, to_first_log_branch, CD, CDMat, CDVec, MathError};

use crate::error::{FermiError, Result};
use crate::matrix::HubbardFermiMatrix;
use crate::Species;

/// `log det M(φ)` for one species, projected onto the first log branch.
///
/// Uses the cached `K⁻¹` and `log det K⁻¹` of the matrix; note that
/// `log det K = −log det K⁻¹`, hence the minus sign on the slice count.
pub fn logdet_m(hfm: &HubbardFermiMatrix, phi: &CDVec, species: Species) -> Result<CD> {
    if hfm.mu() != 0.0 {
        return Err(FermiError::ChemicalPotentialUnsupported);
    }
    let nx = hfm.nx();
    let nt = hfm.nt_of(phi)?;
    let kinv = hfm.kinv(species)?;

    // A = (K⁻¹F(0))·(K⁻¹F(1))···(K⁻¹F(Nt−1)); the slice factors are
    // (symmetric)·(diagonal), so this ordering has the same determinant
    // as the time-descending operator product.
    let mut a = hfm.f(0, phi, species, false)?.rmul_dense(&kinv);
    for t in 1..nt {
        let f = hfm.f(t, phi, species, false)?;
        a = f.rmul_dense(&(a * &kinv));
    }

    let ld_kinv = hfm.logdet_kinv(species)?;
    let one_plus_a = CDMat::identity(nx, nx) + a;
    Ok(to_first_log_branch(
        -(nt as f64) * ld_kinv + ilogdet(one_plus_a)?,
    ))
}

/// Solve `M(φ)·x = b` for a batch of right-hand sides.
///
/// The block-bidiagonal structure of M reduces each solve to one dense
/// `(I + A)` solve on the last time slice plus cheap slice recursions; the
/// products shared by all right-hand sides are computed once and the batch
/// runs in parallel, while each individual solve stays serial.
pub fn solve_m(
    hfm: &HubbardFermiMatrix,
    phi: &CDVec,
    species: Species,
    rhs: &[CDVec],
) -> Result<Vec<CDVec>> {
    if hfm.mu() != 0.0 {
        return Err(FermiError::ChemicalPotentialUnsupported);
    }
    let nx = hfm.nx();
    let nt = hfm.nt_of(phi)?;
    for b in rhs {
        if b.len() != nx * nt {
            return Err(FermiError::SizeMismatch {
                len: b.len(),
                nx,
            });
        }
    }

    let kinv = hfm.kinv(species)?;
    let b_factors: Vec<CDMat> = (0..nt)
        .map(|t| Ok(hfm.f(t, phi, species, false)?.rmul_dense(&kinv)))
        .collect::<Result<_>>()?;

    // A = B(Nt−1)···B(1)·B(0); unlike the determinant, the solve needs the
    // genuine operator ordering.
    let mut a = b_factors[0].clone();
    for b in &b_factors[1..] {
        a = b * a;
    }
    let lu = (CDMat::identity(nx, nx) + a).lu();

    rhs.par_iter()
        .map(|b| {
            // y_t = K⁻¹·b_t per slice.
            let y: Vec<CDVec> = (0..nt)
                .map(|t| &kinv * b.rows(t * nx, nx))
                .collect();

            // Accumulate y_{Nt−1} + B(Nt−1)·y_{Nt−2} + … + B(Nt−1)···B(1)·y_0,
            // which is the right-hand side of (I + A)·x_{Nt−1} = …
            let mut acc = y[0].clone();
            for t in 1..nt {
                acc = &y[t] + &b_factors[t] * acc;
            }
            let x_last = lu
                .solve(&acc)
                .ok_or(FermiError::Math(MathError::Singular))?;

            let mut x = vec![CDVec::zeros(nx); nt];
            if nt > 1 {
                x[0] = &y[0] - &b_factors[0] * &x_last;
                for t in 1..nt - 1 {
                    x[t] = &y[t] + &b_factors[t] * &x[t - 1];
                }
            }
            x[nt - 1] = x_last;

            let mut out = CDVec::zeros(nx * nt);
            for (t, xt) in x.iter().enumerate() {
                out.rows_mut(t * nx, nx).copy_from(xt);
            }
            Ok(out)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Hopping;
    use atoll_math::{logdet, DSMat};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn two_site_hfm(hopping: Hopping) -> HubbardFermiMatrix {
        let kappa = DSMat::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, 1.0)]);
        HubbardFermiMatrix::new(kappa, 0.0, 1, hopping).unwrap()
    }

    fn random_phi(n: usize, rng: &mut StdRng) -> CDVec {
        CDVec::from_fn(n, |_, _| CD::new(rng.gen_range(-1.0..1.0), rng.gen_range(-0.3..0.3)))
    }

    #[test]
    fn logdet_m_matches_dense_determinant() {
        let mut rng = StdRng::seed_from_u64(21);
        for hopping in [Hopping::Dia, Hopping::Exp] {
            let hfm = two_site_hfm(hopping);
            for species in [Species::Particle, Species::Hole] {
                for nt in [1usize, 2, 3, 5] {
                    let phi = random_phi(2 * nt, &mut rng);
                    let fast = logdet_m(&hfm, &phi, species).unwrap();
                    let dense = logdet(&hfm.m(&phi, species).unwrap().to_dense()).unwrap();
                    assert_relative_eq!(fast.re, dense.re, epsilon = 1e-9);
                    assert_relative_eq!(fast.im, dense.im, epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn logdet_m_refuses_chemical_potential() {
        let kappa = DSMat::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, 1.0)]);
        let hfm = HubbardFermiMatrix::new(kappa, 0.3, 1, Hopping::Dia).unwrap();
        assert_eq!(
            logdet_m(&hfm, &CDVec::zeros(4), Species::Particle),
            Err(FermiError::ChemicalPotentialUnsupported)
        );
        assert_eq!(
            solve_m(&hfm, &CDVec::zeros(4), Species::Particle, &[]),
            Err(FermiError::ChemicalPotentialUnsupported)
        );
    }

    #[test]
    fn solve_m_satisfies_the_system() {
        let mut rng = StdRng::seed_from_u64(22);
        for hopping in [Hopping::Dia, Hopping::Exp] {
            let hfm = two_site_hfm(hopping);
            for nt in [1usize, 2, 4] {
                let phi = random_phi(2 * nt, &mut rng);
                let m = hfm.m(&phi, Species::Hole).unwrap();
                let rhs: Vec<CDVec> =
                    (0..3).map(|_| random_phi(2 * nt, &mut rng)).collect();
                let xs = solve_m(&hfm, &phi, Species::Hole, &rhs).unwrap();
                for (x, b) in xs.iter().zip(&rhs) {
                    let residual = m.mul_vec(x) - b;
                    assert_relative_eq!(residual.norm(), 0.0, epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn solve_m_checks_rhs_length() {
        let hfm = two_site_hfm(Hopping::Dia);
        let phi = CDVec::zeros(4);
        assert!(matches!(
            solve_m(&hfm, &phi, Species::Particle, &[CDVec::zeros(3)]),
            Err(FermiError::SizeMismatch { .. })
        ));
    }
}
