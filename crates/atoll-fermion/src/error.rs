//! Error types for atoll-fermion.

use thiserror::Error;

use atoll_math::MathError;

/// Error type for fermion-matrix operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FermiError {
    /// The hopping matrix must be square.
    #[error("hopping matrix is not square: {rows}x{cols}")]
    NonSquareHopping {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
    },

    /// The hole-matrix hopping sign must be ±1.
    #[error("sigma_kappa must be +1 or -1, got {0}")]
    InvalidSigmaKappa(i8),

    /// The auxiliary field must hold a whole number of time slices.
    #[error("field length {len} is not a multiple of the {nx} spatial sites")]
    SizeMismatch {
        /// Field length.
        len: usize,
        /// Number of spatial sites.
        nx: usize,
    },

    /// The single-determinant route is numerically unstable away from
    /// half filling and refuses to run there.
    #[error("chemical potential must be zero for the single-determinant route")]
    ChemicalPotentialUnsupported,

    /// An operation needs more time slices than the field provides.
    #[error("at least {min} time slices required, got {nt}")]
    NtTooSmall {
        /// Number of time slices in the field.
        nt: usize,
        /// Required minimum.
        min: usize,
    },

    /// The block lists of a [`crate::QLu`] have inconsistent sizes.
    #[error("LU factor lists have inconsistent sizes")]
    InconsistentQlu,

    /// A failure in the underlying dense kernels.
    #[error(transparent)]
    Math(#[from] MathError),
}

pub type Result<T> = std::result::Result<T, FermiError>;
