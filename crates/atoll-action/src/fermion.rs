//! Fermionic part of the Hubbard action.
//!
//! `S(φ) = −log det M_p(φ)·M_h(φ)`, evaluated either directly on the
//! fermion matrices ([`Algorithm::DirectSingle`]) or through the Schur
//! form Q ([`Algorithm::DirectSquare`]). The [`Basis::Spin`] flavour
//! analytically continues the field by `−i` before evaluation. On
//! bipartite lattices at half filling with `σκ = +1`, the hole
//! determinant is the complex conjugate of the particle determinant and
//! is never assembled.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use atoll_fermion::{
    logdet_m, logdet_q, FermiError, Hopping, HubbardFermiMatrix, Species,
};
use atoll_lattice::is_bipartite;
use atoll_math::{
    loop_idx, spacemat, to_first_log_branch, CpuOps, DenseOps, CD, CDMat, CDVec, DSMat, I,
};

use crate::error::Result;
use crate::Action;

/// Determinant route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Work on M directly, one determinant per species.
    DirectSingle,
    /// Work on the Schur form Q with `det Q = det M_p · det M_h`.
    DirectSquare,
}

/// Analytic rewriting of the auxiliary field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Basis {
    /// The field couples with opposite phases to particles and holes.
    ParticleHole,
    /// The field is analytically continued by `−i`.
    Spin,
}

/// Decide whether the hole determinant may be recovered from the
/// particle determinant; every refusal names its reason.
fn hole_shortcut_possible(kappa: &DSMat, mu_tilde: f64, sigma_kappa: i8, basis: Basis) -> bool {
    if basis == Basis::Spin {
        info!("not using shortcut for hole determinant, spin basis is not supported");
        return false;
    }
    if !is_bipartite(kappa) {
        info!("not using shortcut for hole determinant, lattice is not bipartite");
        return false;
    }
    // Must be exactly zero.
    if mu_tilde != 0.0 {
        info!("not using shortcut for hole determinant, chemical potential is not zero");
        return false;
    }
    if sigma_kappa != 1 {
        info!("not using shortcut for hole determinant, sigma_kappa is not +1");
        info!(
            "the other parameters allow using the shortcut, \
             consider setting sigma_kappa to +1"
        );
        return false;
    }
    info!("using shortcut to calculate hole determinant from particle determinant");
    true
}

/// Fermion action for the Hubbard model.
///
/// Effectively constant after construction: the owned fermion matrix is
/// not exposed mutably, only its lazy caches move.
pub struct HubbardFermiAction {
    hfm: HubbardFermiMatrix,
    kp: CDMat,
    kh: CDMat,
    algorithm: Algorithm,
    basis: Basis,
    shortcut_for_holes: bool,
    ops: Arc<dyn DenseOps>,
}

impl HubbardFermiAction {
    /// Build the action from the fermion-matrix parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kappa_tilde: DSMat,
        mu_tilde: f64,
        sigma_kappa: i8,
        hopping: Hopping,
        algorithm: Algorithm,
        basis: Basis,
        allow_shortcut: bool,
    ) -> Result<Self> {
        let shortcut_for_holes =
            allow_shortcut && hole_shortcut_possible(&kappa_tilde, mu_tilde, sigma_kappa, basis);
        let hfm = HubbardFermiMatrix::new(kappa_tilde, mu_tilde, sigma_kappa, hopping)?;
        let kp = hfm.k(Species::Particle).to_complex().to_dense();
        let kh = hfm.k(Species::Hole).to_complex().to_dense();
        Ok(Self {
            hfm,
            kp,
            kh,
            algorithm,
            basis,
            shortcut_for_holes,
            ops: Arc::new(CpuOps),
        })
    }

    /// Swap the dense kernel backend used by the force algorithms.
    pub fn with_backend(mut self, ops: Arc<dyn DenseOps>) -> Self {
        self.ops = ops;
        self
    }

    /// Whether the hole determinant is recovered from the particle one.
    pub fn shortcut_for_holes(&self) -> bool {
        self.shortcut_for_holes
    }

    /// The owned fermion matrix.
    pub fn matrix(&self) -> &HubbardFermiMatrix {
        &self.hfm
    }

    /// Determinant route.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Field basis.
    pub fn basis(&self) -> Basis {
        self.basis
    }

    /// Force contribution of one species, without the outer `−i`.
    ///
    /// Shares work between the time slices: the partial products to the
    /// left of `(1 + A⁻¹)⁻¹` are built once in reverse order, the right
    /// factor is grown slice by slice. Only diagonals of the `nx×nx`
    /// products are read off. All dense products and the inversion go
    /// through the [`DenseOps`] backend.
    fn force_direct_single_part(
        &self,
        phi: &CDVec,
        k: &CDMat,
        species: Species,
    ) -> Result<CDVec> {
        let nx = self.hfm.nx();
        let nt = self.hfm.nt_of(phi)?;
        if nt < 2 {
            return Err(FermiError::NtTooSmall { nt, min: 2 }.into());
        }
        let ops = &*self.ops;

        // lefts[j] = F⁻¹(nt−1−j)·K · … · F⁻¹(nt−1)·K, stored in reverse
        // time order.
        let mut lefts: Vec<CDMat> = Vec::with_capacity(nt - 1);
        lefts.push(self.hfm.f(nt - 1, phi, species, true)?.mul_dense(k));
        for t in (1..nt - 1).rev() {
            let fk = self.hfm.f(t, phi, species, true)?.mul_dense(k);
            let prod = ops.matmul(&fk, &lefts[lefts.len() - 1]);
            lefts.push(prod);
        }
        let ainv = ops.matmul(
            &self.hfm.f(0, phi, species, true)?.mul_dense(k),
            &lefts[nt - 2],
        );

        let mut right = ops.inverse(&(CDMat::identity(nx, nx) + &ainv))?;

        let mut force = CDVec::zeros(nx * nt);
        let prod = ops.matmul(&ainv, &right);
        for x in 0..nx {
            force[(nt - 1) * nx + x] = prod[(x, x)];
        }

        for tau in 0..nt - 1 {
            let fk = self.hfm.f(tau, phi, species, true)?.mul_dense(k);
            right = ops.matmul(&right, &fk);
            let prod = ops.matmul(&lefts[nt - 2 - tau], &right);
            for x in 0..nx {
                force[tau * nx + x] = prod[(x, x)];
            }
        }
        Ok(force)
    }

    /// Force through the Schur form: `±i·diag` of T blocks against the
    /// wrapped off-diagonal blocks of `Q⁻¹`.
    ///
    /// The two discretisations place the field phases on opposite sides
    /// of the T blocks, so the products swap sides accordingly.
    fn force_direct_square(&self, phi: &CDVec) -> Result<CDVec> {
        let nx = self.hfm.nx();
        let nt = self.hfm.nt_of(phi)?;
        let qinv = self.ops.inverse(&self.hfm.q(phi)?.to_dense())?;

        let mut force = CDVec::zeros(nx * nt);
        for tau in 0..nt {
            let tau1 = loop_idx(tau + 1, nt);
            let tp = self.hfm.tplus(tau1, phi)?;
            let tm = self.hfm.tminus(tau, phi)?;
            let q_up = spacemat(&qinv, tau, tau1, nx);
            let q_down = spacemat(&qinv, tau1, tau, nx);

            let (a, b) = match self.hfm.hopping() {
                Hopping::Dia => (tp.mul_dense(&q_up), tm.rmul_dense(&q_down)),
                Hopping::Exp => (tp.rmul_dense(&q_up), tm.mul_dense(&q_down)),
            };
            for x in 0..nx {
                force[tau * nx + x] = I * (a[(x, x)] - b[(x, x)]);
            }
        }
        Ok(force)
    }
}

impl Action for HubbardFermiAction {
    fn eval(&self, phi: &CDVec) -> Result<CD> {
        match (self.algorithm, self.basis) {
            (Algorithm::DirectSingle, Basis::ParticleHole) => {
                if self.shortcut_for_holes {
                    let ldp = logdet_m(&self.hfm, phi, Species::Particle)?;
                    Ok(-to_first_log_branch(ldp + ldp.conj()))
                } else {
                    let ldp = logdet_m(&self.hfm, phi, Species::Particle)?;
                    let ldh = logdet_m(&self.hfm, phi, Species::Hole)?;
                    Ok(-to_first_log_branch(ldp + ldh))
                }
            }
            (Algorithm::DirectSingle, Basis::Spin) => {
                let aux = phi.map(|z| -I * z);
                let ldp = logdet_m(&self.hfm, &aux, Species::Particle)?;
                let ldh = logdet_m(&self.hfm, &aux, Species::Hole)?;
                Ok(-to_first_log_branch(ldp + ldh))
            }
            (Algorithm::DirectSquare, Basis::ParticleHole) => Ok(-logdet_q(&self.hfm, phi)?),
            (Algorithm::DirectSquare, Basis::Spin) => {
                let aux = phi.map(|z| -I * z);
                Ok(-logdet_q(&self.hfm, &aux)?)
            }
        }
    }

    fn force(&self, phi: &CDVec) -> Result<CDVec> {
        match (self.algorithm, self.basis) {
            (Algorithm::DirectSingle, Basis::ParticleHole) => {
                if self.shortcut_for_holes {
                    let fp = self.force_direct_single_part(phi, &self.kp, Species::Particle)?;
                    Ok(fp.map(|z| -I * (z - z.conj())))
                } else {
                    let fp = self.force_direct_single_part(phi, &self.kp, Species::Particle)?;
                    let fh = self.force_direct_single_part(phi, &self.kh, Species::Hole)?;
                    Ok((fp - fh).map(|z| -I * z))
                }
            }
            (Algorithm::DirectSingle, Basis::Spin) => {
                // The −i from the substitution and the −i of the
                // particle/hole force combine into the plain difference.
                let aux = phi.map(|z| -I * z);
                let fp = self.force_direct_single_part(&aux, &self.kp, Species::Particle)?;
                let fh = self.force_direct_single_part(&aux, &self.kh, Species::Hole)?;
                Ok(fh - fp)
            }
            (Algorithm::DirectSquare, Basis::ParticleHole) => self.force_direct_square(phi),
            (Algorithm::DirectSquare, Basis::Spin) => {
                let aux = phi.map(|z| -I * z);
                Ok(self.force_direct_square(&aux)?.map(|z| -I * z))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use atoll_lattice::Lattice;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn chain_kappa(nx: usize) -> DSMat {
        Lattice::chain(nx, 4).unwrap().hopping().scaled(0.5)
    }

    fn triangle_kappa() -> DSMat {
        Lattice::triangle(4).unwrap().hopping().scaled(0.5)
    }

    fn action(
        kappa: DSMat,
        mu: f64,
        sigma_kappa: i8,
        hopping: Hopping,
        algorithm: Algorithm,
        basis: Basis,
    ) -> HubbardFermiAction {
        HubbardFermiAction::new(kappa, mu, sigma_kappa, hopping, algorithm, basis, true)
            .unwrap()
    }

    fn random_real_phi(n: usize, rng: &mut StdRng) -> CDVec {
        CDVec::from_fn(n, |_, _| CD::new(rng.gen_range(-0.8..0.8), 0.0))
    }

    #[test]
    fn shortcut_decision_matrix() {
        let mk = |kappa, mu, sk, basis, allow| {
            HubbardFermiAction::new(
                kappa,
                mu,
                sk,
                Hopping::Dia,
                Algorithm::DirectSingle,
                basis,
                allow,
            )
            .unwrap()
            .shortcut_for_holes()
        };

        assert!(mk(chain_kappa(4), 0.0, 1, Basis::ParticleHole, true));
        assert!(!mk(triangle_kappa(), 0.0, 1, Basis::ParticleHole, true));
        assert!(!mk(chain_kappa(4), 0.1, 1, Basis::ParticleHole, true));
        assert!(!mk(chain_kappa(4), 0.0, -1, Basis::ParticleHole, true));
        assert!(!mk(chain_kappa(4), 0.0, 1, Basis::Spin, true));
        assert!(!mk(chain_kappa(4), 0.0, 1, Basis::ParticleHole, false));
    }

    #[test]
    fn single_and_square_routes_agree() {
        let mut rng = StdRng::seed_from_u64(41);
        for hopping in [Hopping::Dia, Hopping::Exp] {
            for basis in [Basis::ParticleHole, Basis::Spin] {
                let single = action(
                    chain_kappa(2),
                    0.0,
                    1,
                    hopping,
                    Algorithm::DirectSingle,
                    basis,
                );
                let square = action(
                    chain_kappa(2),
                    0.0,
                    1,
                    hopping,
                    Algorithm::DirectSquare,
                    basis,
                );
                for _ in 0..5 {
                    let phi = random_real_phi(8, &mut rng);
                    let s1 = single.eval(&phi).unwrap();
                    let s2 = square.eval(&phi).unwrap();
                    assert_relative_eq!(s1.re, s2.re, epsilon = 1e-9);
                    assert_relative_eq!(s1.im, s2.im, epsilon = 1e-9);

                    let f1 = single.force(&phi).unwrap();
                    let f2 = square.force(&phi).unwrap();
                    assert_relative_eq!((f1 - f2).norm(), 0.0, epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn single_route_force_requires_two_slices() {
        let single = action(
            chain_kappa(2),
            0.0,
            1,
            Hopping::Dia,
            Algorithm::DirectSingle,
            Basis::ParticleHole,
        );
        let phi = CDVec::zeros(2);
        assert!(matches!(
            single.force(&phi),
            Err(crate::ActionError::Fermi(FermiError::NtTooSmall {
                nt: 1,
                min: 2
            }))
        ));
    }

    #[test]
    fn force_is_negative_gradient() {
        // Central finite differences against the analytic force for the
        // sign-critical direct-square route.
        let mut rng = StdRng::seed_from_u64(42);
        for hopping in [Hopping::Dia, Hopping::Exp] {
            let act = action(
                chain_kappa(2),
                0.0,
                1,
                hopping,
                Algorithm::DirectSquare,
                Basis::ParticleHole,
            );
            let phi = random_real_phi(8, &mut rng);
            let force = act.force(&phi).unwrap();
            let eps = 1e-5;
            for idx in 0..phi.len() {
                let mut plus = phi.clone();
                plus[idx] += CD::new(eps, 0.0);
                let mut minus = phi.clone();
                minus[idx] -= CD::new(eps, 0.0);
                let grad = (act.eval(&plus).unwrap() - act.eval(&minus).unwrap()) / (2.0 * eps);
                assert_relative_eq!(force[idx].re, -grad.re, epsilon = 1e-6);
                assert_relative_eq!(force[idx].im, -grad.im, epsilon = 1e-6);
            }
        }
    }
}
