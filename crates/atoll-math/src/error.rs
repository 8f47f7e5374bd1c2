//! Error types for atoll-math.

use thiserror::Error;

/// Error type for the math kernels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    /// A square matrix was required.
    #[error("matrix is not square: {rows}x{cols}")]
    NonSquare {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
    },

    /// An LU pivot vanished exactly; the matrix is singular.
    #[error("matrix is singular")]
    Singular,

    /// Operand shapes are incompatible.
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch {
        /// Dimension supplied by the left operand.
        left: usize,
        /// Dimension supplied by the right operand.
        right: usize,
    },
}

pub type Result<T> = std::result::Result<T, MathError>;
