//! Error types for atoll-action.

use thiserror::Error;

use atoll_fermion::FermiError;
use atoll_math::MathError;

/// Error type for action construction and evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    /// The gauge coupling must be positive.
    #[error("coupling U-tilde must be positive, got {0}")]
    InvalidCoupling(f64),

    /// A failure in the fermion-matrix layer.
    #[error(transparent)]
    Fermi(#[from] FermiError),

    /// A failure in the dense kernels.
    #[error(transparent)]
    Math(#[from] MathError),

    /// An accelerator backend failed to produce a result.
    #[error("backend failure: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, ActionError>;
