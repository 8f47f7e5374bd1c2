//! Hubbard-model fermion matrices for the atoll engine.
//!
//! The fermion matrix `M(φ; κ, μ, σκ)` is block-cyclic in time with
//! anti-periodic boundary terms. Two discretisations of the hopping kernel
//! are supported: [`Hopping::Dia`] keeps the linear form, [`Hopping::Exp`]
//! moves the hopping into matrix exponentials. The Schur form
//! `Q = M_particle·M_holeᵀ` is block-cyclic tridiagonal and carries the
//! determinant identity `det Q = det M_p · det M_h`.
//!
//! # Modules
//!
//! - [`matrix`]: the matrix family K, F, M, P, T±, Q with lazy caches
//! - [`qlu`]: bespoke block LU of Q, `solve_q`, `logdet_q`
//! - [`solver`]: single-determinant route, `logdet_m`, `solve_m`

pub mod error;
pub mod matrix;
pub mod qlu;
pub mod solver;

pub use error::{FermiError, Result};
pub use matrix::HubbardFermiMatrix;
pub use qlu::{get_qlu, ilogdet_q, logdet_q, logdet_q_lu, solve_q, solve_q_lu, QLu};
pub use solver::{logdet_m, solve_m};

use serde::{Deserialize, Serialize};

/// Which of the two fermion Green's functions the matrix M represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Species {
    Particle,
    Hole,
}

/// Discretisation of the hopping kernel on a time slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hopping {
    /// Linear form: the hopping matrix enters the diagonal blocks directly.
    Dia,
    /// Exponential form: the hopping is exponentiated into the hopping
    /// factors of the off-diagonal blocks.
    Exp,
}
