//! Gauge part of the Hubbard action.

use serde::{Deserialize, Serialize};

use atoll_math::{CD, CDVec};

use crate::error::{ActionError, Result};
use crate::Action;

/// Quadratic gauge action of the Hubbard model.
///
/// `S(φ) = φ·φ / (2Ũ)` with the complex bilinear dot product — no
/// conjugation — and `F(φ) = −φ/Ũ`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HubbardGaugeAction {
    utilde: f64,
}

impl HubbardGaugeAction {
    /// Build the action for coupling `Ũ > 0`.
    pub fn new(utilde: f64) -> Result<Self> {
        if !(utilde > 0.0) {
            return Err(ActionError::InvalidCoupling(utilde));
        }
        Ok(Self { utilde })
    }

    /// The coupling Ũ.
    pub fn utilde(&self) -> f64 {
        self.utilde
    }
}

impl Action for HubbardGaugeAction {
    fn eval(&self, phi: &CDVec) -> Result<CD> {
        let dot: CD = phi.iter().map(|z| z * z).sum();
        Ok(dot / (2.0 * self.utilde))
    }

    fn force(&self, phi: &CDVec) -> Result<CDVec> {
        Ok(phi.map(|z| -z / self.utilde))
    }
}
