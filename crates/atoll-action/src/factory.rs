//! Runtime construction of fermion actions.

use serde::{Deserialize, Serialize};

use atoll_fermion::Hopping;
use atoll_lattice::Lattice;
use atoll_math::DSMat;

use crate::error::Result;
use crate::fermion::{Algorithm, Basis, HubbardFermiAction};

/// Runtime selection of the fermion action flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FermiActionConfig {
    /// Discretisation of the hopping kernel.
    pub hopping: Hopping,
    /// Field basis.
    pub basis: Basis,
    /// Determinant route.
    pub algorithm: Algorithm,
    /// Permit recovering the hole determinant from the particle one when
    /// the parameters allow it.
    pub allow_shortcut: bool,
}

impl Default for FermiActionConfig {
    fn default() -> Self {
        Self {
            hopping: Hopping::Dia,
            basis: Basis::ParticleHole,
            algorithm: Algorithm::DirectSingle,
            allow_shortcut: true,
        }
    }
}

/// Build a fermion action from the model parameters.
///
/// `kappa_tilde` and `mu_tilde` are the hopping matrix and chemical
/// potential already scaled by the temporal lattice spacing.
pub fn make_hubbard_fermi_action(
    kappa_tilde: DSMat,
    mu_tilde: f64,
    sigma_kappa: i8,
    config: &FermiActionConfig,
) -> Result<HubbardFermiAction> {
    HubbardFermiAction::new(
        kappa_tilde,
        mu_tilde,
        sigma_kappa,
        config.hopping,
        config.algorithm,
        config.basis,
        config.allow_shortcut,
    )
}

/// Build a fermion action from a lattice and inverse temperature.
///
/// Scales the hopping by the temporal lattice spacing:
/// `κ̃ = κ·β/Nt`.
pub fn make_hubbard_fermi_action_for(
    lattice: &Lattice,
    beta: f64,
    mu_tilde: f64,
    sigma_kappa: i8,
    config: &FermiActionConfig,
) -> Result<HubbardFermiAction> {
    let kappa_tilde = lattice.hopping().scaled(beta / lattice.nt() as f64);
    make_hubbard_fermi_action(kappa_tilde, mu_tilde, sigma_kappa, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Action;
    use approx::assert_relative_eq;
    use atoll_math::{CD, CDVec};

    #[test]
    fn default_config() {
        let config = FermiActionConfig::default();
        assert_eq!(config.hopping, Hopping::Dia);
        assert_eq!(config.basis, Basis::ParticleHole);
        assert_eq!(config.algorithm, Algorithm::DirectSingle);
        assert!(config.allow_shortcut);
    }

    #[test]
    fn lattice_overload_scales_the_hopping() {
        let lattice = Lattice::chain(2, 4).unwrap();
        let beta = 6.0;
        let config = FermiActionConfig::default();

        let from_lattice =
            make_hubbard_fermi_action_for(&lattice, beta, 0.0, 1, &config).unwrap();
        let scaled = lattice.hopping().scaled(beta / 4.0);
        let from_kappa = make_hubbard_fermi_action(scaled, 0.0, 1, &config).unwrap();

        let phi = CDVec::from_fn(8, |i, _| CD::new(0.1 * i as f64, 0.0));
        let a = from_lattice.eval(&phi).unwrap();
        let b = from_kappa.eval(&phi).unwrap();
        assert_relative_eq!(a.re, b.re, epsilon = 1e-14);
        assert_relative_eq!(a.im, b.im, epsilon = 1e-14);
    }

    #[test]
    fn factory_covers_all_flavours() {
        let lattice = Lattice::chain(2, 4).unwrap();
        let phi = CDVec::from_fn(8, |i, _| CD::new(0.05 * (i as f64 - 3.0), 0.0));

        for hopping in [Hopping::Dia, Hopping::Exp] {
            for basis in [Basis::ParticleHole, Basis::Spin] {
                for algorithm in [Algorithm::DirectSingle, Algorithm::DirectSquare] {
                    let config = FermiActionConfig {
                        hopping,
                        basis,
                        algorithm,
                        allow_shortcut: true,
                    };
                    let act =
                        make_hubbard_fermi_action_for(&lattice, 4.0, 0.0, 1, &config).unwrap();
                    let s = act.eval(&phi).unwrap();
                    assert!(s.re.is_finite() && s.im.is_finite());
                    let f = act.force(&phi).unwrap();
                    assert_eq!(f.len(), phi.len());
                }
            }
        }
    }
}
