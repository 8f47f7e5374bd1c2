//! Actions for the atoll lattice Monte-Carlo engine.
//!
//! An action is a functional `S: ℂ^{nx·nt} → ℂ` whose exponential weighs
//! field configurations in the Monte-Carlo measure, together with its
//! analytic derivative. The concrete actions are
//! [`HubbardGaugeAction`], the eight flavours of [`HubbardFermiAction`],
//! and the composing [`SumAction`]; `+` on `&dyn Action` builds sums.

pub mod error;
pub mod factory;
pub mod fermion;
pub mod gauge;
pub mod sum;

pub use error::{ActionError, Result};
pub use factory::{
    make_hubbard_fermi_action, make_hubbard_fermi_action_for, FermiActionConfig,
};
pub use fermion::{Algorithm, Basis, HubbardFermiAction};
pub use gauge::HubbardGaugeAction;
pub use sum::SumAction;

use atoll_math::{CD, CDVec};

/// Functional S(φ) with its analytic derivative.
pub trait Action {
    /// Evaluate the action for the given auxiliary field.
    fn eval(&self, phi: &CDVec) -> Result<CD>;

    /// The force `−∂S/∂φ` for the given auxiliary field.
    fn force(&self, phi: &CDVec) -> Result<CDVec>;

    /// The members to splice when this action joins a sum; lets
    /// [`SumAction`] flatten nested sums. Leaf actions return `None`.
    fn as_sum(&self) -> Option<&SumAction<'_>> {
        None
    }
}
