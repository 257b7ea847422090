//! Error types for the hashing primitives.

use bb84_bits::BitsError;
use thiserror::Error;

/// Dimension errors from Toeplitz construction and multiplication.
///
/// These indicate a bug in the caller (mis-sized seed or input), not bad
/// peer data, and are fatal to the round.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    /// The diagonal seed cannot cover an `m x n` matrix.
    #[error("toeplitz seed holds {have} diagonals, needs {need}")]
    SeedTooShort {
        /// Diagonals available.
        have: usize,
        /// Diagonals required (`m + n - 1`).
        need: usize,
    },

    /// The input vector length does not match the matrix width.
    #[error("multiplying {m}x{n} matrix into {dim}-dim vector")]
    DimMismatch {
        /// Matrix rows.
        m: usize,
        /// Matrix columns.
        n: usize,
        /// Input vector dimension.
        dim: usize,
    },

    /// A bit-vector range operation failed underneath.
    #[error(transparent)]
    Bits(#[from] BitsError),
}
