//! Leapfrog hybrid Monte-Carlo driver.
//!
//! Evolves a real auxiliary field under the real part of the complex
//! force with Gaussian momenta and a Metropolis accept/reject on the
//! Hamiltonian `H = p·p/2 + Re S(φ)`.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use atoll_action::{Action, Result};
use atoll_math::{CDVec, DVec, CD};

/// Parameters of one molecular-dynamics trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HmcParams {
    /// Leapfrog steps per trajectory.
    pub md_steps: usize,

    /// Leapfrog step size.
    pub dt: f64,

    /// Keep every trajectory endpoint instead of deciding by the
    /// Metropolis rule; turns the driver into plain molecular dynamics.
    pub always_accept: bool,
}

impl Default for HmcParams {
    fn default() -> Self {
        Self {
            md_steps: 8,
            dt: 0.05,
            always_accept: false,
        }
    }
}

/// Running record of a Monte-Carlo run.
#[derive(Debug, Clone, Default)]
pub struct HmcStats {
    /// Trajectories attempted.
    pub trajectories: usize,

    /// Trajectories whose endpoint was kept.
    pub accepted: usize,

    /// Hamiltonian recorded after each trajectory.
    pub history: Vec<f64>,
}

impl HmcStats {
    /// Fraction of kept trajectories.
    pub fn acceptance_rate(&self) -> f64 {
        if self.trajectories == 0 {
            return 0.0;
        }
        self.accepted as f64 / self.trajectories as f64
    }

    /// Mean |ΔH| between consecutive recorded trajectories.
    ///
    /// The leapfrog error per trajectory is O(dt²); a drift that grows
    /// with the run instead of hovering near that scale means the step
    /// size is too coarse for the current field region.
    pub fn average_drift(&self) -> f64 {
        let steps = self.history.len().saturating_sub(1);
        if steps == 0 {
            return 0.0;
        }
        let jumps: f64 = self.history.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        jumps / steps as f64
    }

    /// Hamiltonian after the most recent trajectory, if any ran.
    pub fn last_hamiltonian(&self) -> Option<f64> {
        self.history.last().copied()
    }
}

fn hamiltonian(action: &dyn Action, phi: &CDVec, momenta: &DVec) -> Result<f64> {
    let kinetic: f64 = 0.5 * momenta.iter().map(|p| p * p).sum::<f64>();
    Ok(kinetic + action.eval(phi)?.re)
}

/// Run one HMC trajectory; `phi` keeps its new value only when accepted.
///
/// Returns whether the trajectory was accepted.
pub fn hmc_step<R: Rng>(
    action: &dyn Action,
    phi: &mut CDVec,
    params: &HmcParams,
    stats: &mut HmcStats,
    rng: &mut R,
) -> Result<bool> {
    let n = phi.len();
    let mut momenta = DVec::from_fn(n, |_, _| rng.sample(StandardNormal));
    let h_initial = hamiltonian(action, phi, &momenta)?;
    let phi_initial = phi.clone();

    // Leapfrog: half-step for momenta, alternating full steps, half-step.
    let force = action.force(phi)?;
    for i in 0..n {
        momenta[i] += 0.5 * params.dt * force[i].re;
    }
    for step in 0..params.md_steps {
        for i in 0..n {
            phi[i] += CD::new(params.dt * momenta[i], 0.0);
        }
        let force = action.force(phi)?;
        let factor = if step + 1 == params.md_steps { 0.5 } else { 1.0 };
        for i in 0..n {
            momenta[i] += factor * params.dt * force[i].re;
        }
    }

    let h_final = hamiltonian(action, phi, &momenta)?;
    let accepted = if params.always_accept {
        true
    } else {
        let delta_h = h_final - h_initial;
        rng.gen::<f64>() < (-delta_h).exp().min(1.0)
    };

    if !accepted {
        *phi = phi_initial;
    }
    stats.trajectories += 1;
    if accepted {
        stats.accepted += 1;
    }
    stats
        .history
        .push(if accepted { h_final } else { h_initial });
    Ok(accepted)
}
