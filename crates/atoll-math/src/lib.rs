//! Math primitives for the atoll lattice Monte-Carlo engine.
//!
//! Provides the scalar and tensor aliases shared across the workspace, a
//! compact CSR sparse matrix, spacetime slice indexing, complex
//! log-determinants projected onto the first branch of the logarithm, the
//! symmetric matrix exponential, and the dense-kernel backend seam used by
//! the force hot path.
//!
//! Spacetime vectors of length `nx*nt` store the spatial slice for time
//! `t` contiguously at `[t*nx, (t+1)*nx)`; see [`spacetime`].

pub mod backend;
pub mod error;
pub mod linalg;
pub mod spacetime;
pub mod sparse;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

pub use backend::{CpuOps, DenseOps};
pub use error::{MathError, Result};
pub use linalg::{expm_sym, ilogdet, logdet, to_first_log_branch};
pub use spacetime::{loop_idx, spacemat, spacetime_coord, spacevec};
pub use sparse::SparseMat;

/// Complex double-precision scalar.
pub type CD = Complex64;

/// Dense real vector.
pub type DVec = DVector<f64>;

/// Dense complex vector.
pub type CDVec = DVector<CD>;

/// Dense real matrix.
pub type DMat = DMatrix<f64>;

/// Dense complex matrix.
pub type CDMat = DMatrix<CD>;

/// Sparse real matrix.
pub type DSMat = SparseMat<f64>;

/// Sparse complex matrix.
pub type CDSMat = SparseMat<CD>;

/// The imaginary unit.
pub const I: CD = Complex64::new(0.0, 1.0);
