//! End-to-end scenarios for the atoll engine.

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use atoll::{
    is_bipartite, logdet_m, make_hubbard_fermi_action, to_first_log_branch, Action, Algorithm,
    Basis, FermiActionConfig, HubbardFermiMatrix, HubbardGaugeAction, Hopping, Lattice, Species,
    CD, CDVec, DSMat,
};

fn real_phi(n: usize, rng: &mut StdRng) -> CDVec {
    CDVec::from_fn(n, |_, _| CD::new(rng.gen_range(-0.8..0.8), 0.0))
}

fn config(hopping: Hopping, basis: Basis, algorithm: Algorithm) -> FermiActionConfig {
    FermiActionConfig {
        hopping,
        basis,
        algorithm,
        allow_shortcut: true,
    }
}

#[test]
fn gauge_action_literal_values() {
    let action = HubbardGaugeAction::new(1.0).unwrap();
    let mut phi = CDVec::zeros(8);
    phi[0] = CD::new(1.0, 0.0);

    assert_eq!(action.eval(&phi).unwrap(), CD::new(0.5, 0.0));

    let force = action.force(&phi).unwrap();
    assert_eq!(force[0], CD::new(-1.0, 0.0));
    for i in 1..8 {
        assert_eq!(force[i], CD::new(0.0, 0.0));
    }
}

#[test]
fn empty_hopping_has_closed_form_determinant() {
    // κ ≡ 0 makes K the identity and M block-bidiagonal in pure phases:
    // det M = Π_x (1 + exp(i·Σ_t φ_{x,t})).
    let nx = 2;
    let nt = 4;
    let kappa = DSMat::zeros(nx, nx);
    assert!(is_bipartite(&kappa));

    let hfm = HubbardFermiMatrix::new(kappa.clone(), 0.0, 1, Hopping::Dia).unwrap();
    let mut rng = StdRng::seed_from_u64(61);
    for _ in 0..10 {
        let phi = real_phi(nx * nt, &mut rng);
        let ld = logdet_m(&hfm, &phi, Species::Particle).unwrap();

        let mut closed = CD::new(0.0, 0.0);
        for x in 0..nx {
            let total: CD = (0..nt).map(|t| phi[t * nx + x]).sum();
            closed += (CD::new(1.0, 0.0) + (CD::new(0.0, 1.0) * total).exp()).ln();
        }
        let closed = to_first_log_branch(closed);
        assert_relative_eq!(ld.re, closed.re, epsilon = 1e-12);
        assert_relative_eq!(ld.im, closed.im, epsilon = 1e-12);

        let dense = atoll::logdet(&hfm.m(&phi, Species::Particle).unwrap().to_dense()).unwrap();
        assert_relative_eq!(ld.re, dense.re, epsilon = 1e-10);
        assert_relative_eq!(ld.im, dense.im, epsilon = 1e-10);
    }

    // At φ = 0 every site contributes log 2 and the force vanishes; the
    // trivially bipartite lattice lets the action reuse the particle
    // determinant.
    let action = make_hubbard_fermi_action(
        kappa,
        0.0,
        1,
        &config(Hopping::Dia, Basis::ParticleHole, Algorithm::DirectSingle),
    )
    .unwrap();
    assert!(action.shortcut_for_holes());

    let zero = CDVec::zeros(nx * nt);
    let ld0 = logdet_m(action.matrix(), &zero, Species::Particle).unwrap();
    assert_relative_eq!(ld0.re, nx as f64 * 2f64.ln(), epsilon = 1e-12);
    assert_relative_eq!(ld0.im, 0.0, epsilon = 1e-12);

    let s0 = action.eval(&zero).unwrap();
    assert_relative_eq!(s0.re, -2.0 * nx as f64 * 2f64.ln(), epsilon = 1e-12);
    let f0 = action.force(&zero).unwrap();
    assert_relative_eq!(f0.norm(), 0.0, epsilon = 1e-12);
}

#[test]
fn two_site_chain_schur_determinant_at_zero_field() {
    // Unit-coupling two-site chain, three slices: Q at φ = 0 is a real
    // deterministic block matrix; the block LU must reproduce the dense
    // log-determinant and the two-determinant identity.
    let lattice = Lattice::chain(2, 3).unwrap();
    let hfm = HubbardFermiMatrix::new(lattice.hopping().clone(), 0.0, 1, Hopping::Dia).unwrap();
    let phi = CDVec::zeros(6);

    let ld = atoll::logdet_q(&hfm, &phi).unwrap();
    let dense = atoll::logdet(&hfm.q(&phi).unwrap().to_dense()).unwrap();
    assert_relative_eq!(ld.re, dense.re, epsilon = 1e-10);
    assert_relative_eq!(ld.im, dense.im, epsilon = 1e-10);

    let ldp = atoll::logdet(&hfm.m(&phi, Species::Particle).unwrap().to_dense()).unwrap();
    let ldh = atoll::logdet(&hfm.m(&phi, Species::Hole).unwrap().to_dense()).unwrap();
    let sum = to_first_log_branch(ldp + ldh);
    assert_relative_eq!(ld.re, sum.re, epsilon = 1e-10);
    assert_relative_eq!(ld.im, sum.im, epsilon = 1e-10);
}

#[test]
fn spin_basis_matches_continued_particle_hole() {
    // S_spin(φ) = S_ph(−i·φ); the particle/hole action must not take the
    // conjugation shortcut on the complexified field.
    let lattice = Lattice::chain(2, 4).unwrap();
    let kappa = lattice.hopping().scaled(0.5);
    let mut rng = StdRng::seed_from_u64(62);

    for algorithm in [Algorithm::DirectSingle, Algorithm::DirectSquare] {
        let spin = make_hubbard_fermi_action(
            kappa.clone(),
            0.0,
            1,
            &config(Hopping::Dia, Basis::Spin, algorithm),
        )
        .unwrap();
        let ph = make_hubbard_fermi_action(
            kappa.clone(),
            0.0,
            1,
            &FermiActionConfig {
                hopping: Hopping::Dia,
                basis: Basis::ParticleHole,
                algorithm,
                allow_shortcut: false,
            },
        )
        .unwrap();

        for _ in 0..5 {
            let phi = real_phi(8, &mut rng);
            let aux = phi.map(|z| CD::new(0.0, -1.0) * z);
            let s_spin = spin.eval(&phi).unwrap();
            let s_ph = ph.eval(&aux).unwrap();
            assert_relative_eq!(s_spin.re, s_ph.re, epsilon = 1e-10);
            assert_relative_eq!(s_spin.im, s_ph.im, epsilon = 1e-10);
        }
    }
}

#[test]
fn shortcut_changes_nothing_for_eligible_parameters() {
    let lattice = Lattice::chain(2, 4).unwrap();
    let kappa = lattice.hopping().scaled(0.4);
    let mut rng = StdRng::seed_from_u64(63);

    for hopping in [Hopping::Dia, Hopping::Exp] {
        let with = make_hubbard_fermi_action(
            kappa.clone(),
            0.0,
            1,
            &config(hopping, Basis::ParticleHole, Algorithm::DirectSingle),
        )
        .unwrap();
        let without = make_hubbard_fermi_action(
            kappa.clone(),
            0.0,
            1,
            &FermiActionConfig {
                hopping,
                basis: Basis::ParticleHole,
                algorithm: Algorithm::DirectSingle,
                allow_shortcut: false,
            },
        )
        .unwrap();
        assert!(with.shortcut_for_holes());
        assert!(!without.shortcut_for_holes());

        for _ in 0..100 {
            let phi = real_phi(8, &mut rng);
            let sa = with.eval(&phi).unwrap();
            let sb = without.eval(&phi).unwrap();
            assert_relative_eq!(sa.re, sb.re, epsilon = 1e-10);
            assert_relative_eq!(sa.im, sb.im, epsilon = 1e-10);

            let fa = with.force(&phi).unwrap();
            let fb = without.force(&phi).unwrap();
            for i in 0..fa.len() {
                assert_relative_eq!(fa[i].re, fb[i].re, epsilon = 1e-10);
                assert_relative_eq!(fa[i].im, fb[i].im, epsilon = 1e-10);
            }
        }
    }
}

#[test]
fn force_is_negative_gradient_for_all_flavours() {
    // Central finite differences of S against the analytic force for
    // every hopping × algorithm × basis combination.
    let lattice = Lattice::chain(2, 4).unwrap();
    let kappa = lattice.hopping().scaled(0.5);
    let mut rng = StdRng::seed_from_u64(64);
    let eps = 1e-4;

    for hopping in [Hopping::Dia, Hopping::Exp] {
        for basis in [Basis::ParticleHole, Basis::Spin] {
            for algorithm in [Algorithm::DirectSingle, Algorithm::DirectSquare] {
                let action = make_hubbard_fermi_action(
                    kappa.clone(),
                    0.0,
                    1,
                    &config(hopping, basis, algorithm),
                )
                .unwrap();

                let phi = real_phi(8, &mut rng);
                let force = action.force(&phi).unwrap();
                for idx in 0..phi.len() {
                    let mut plus = phi.clone();
                    plus[idx] += CD::new(eps, 0.0);
                    let mut minus = phi.clone();
                    minus[idx] -= CD::new(eps, 0.0);
                    let grad = (action.eval(&plus).unwrap() - action.eval(&minus).unwrap())
                        / (2.0 * eps);
                    assert_relative_eq!(force[idx].re, -grad.re, epsilon = 1e-6);
                    assert_relative_eq!(force[idx].im, -grad.im, epsilon = 1e-6);
                }
            }
        }
    }
}

#[test]
fn sums_compose_and_flatten() {
    let gauge = HubbardGaugeAction::new(1.0).unwrap();
    let lattice = Lattice::chain(2, 4).unwrap();
    let fermion = make_hubbard_fermi_action(
        lattice.hopping().scaled(0.5),
        0.0,
        1,
        &FermiActionConfig::default(),
    )
    .unwrap();
    let extra = HubbardGaugeAction::new(3.0).unwrap();

    let left = ((&gauge as &dyn Action) + (&fermion as &dyn Action)) + (&extra as &dyn Action);
    let right = (&gauge as &dyn Action) + ((&fermion as &dyn Action) + (&extra as &dyn Action));
    assert_eq!(left.len(), 3);
    assert_eq!(right.len(), 3);

    let mut rng = StdRng::seed_from_u64(65);
    let phi = real_phi(8, &mut rng);

    let pair = (&gauge as &dyn Action) + (&fermion as &dyn Action);
    let expected = gauge.eval(&phi).unwrap() + fermion.eval(&phi).unwrap();
    assert_eq!(pair.eval(&phi).unwrap(), expected);

    let f = pair.force(&phi).unwrap();
    let expected_f = gauge.force(&phi).unwrap() + fermion.force(&phi).unwrap();
    assert_relative_eq!((f - expected_f).norm(), 0.0, epsilon = 1e-14);
}

#[test]
fn hmc_samples_the_gauge_distribution() {
    // Gauge-only HMC: ⟨φ²⟩ → Ũ for the Gaussian weight exp(−φ²/2Ũ).
    let action = HubbardGaugeAction::new(1.0).unwrap();
    let mut phi = CDVec::zeros(4);
    let mut rng = StdRng::seed_from_u64(66);
    let params = atoll::HmcParams {
        md_steps: 10,
        dt: 0.2,
        always_accept: false,
    };
    let mut stats = atoll::HmcStats::default();

    let mut second_moment = 0.0;
    let n_traj = 2000;
    for _ in 0..n_traj {
        atoll::hmc_step(&action, &mut phi, &params, &mut stats, &mut rng).unwrap();
        second_moment += phi.iter().map(|z| z.re * z.re).sum::<f64>() / phi.len() as f64;
    }
    second_moment /= n_traj as f64;

    assert!(stats.acceptance_rate() > 0.5);
    assert_relative_eq!(second_moment, 1.0, epsilon = 0.2);
}
