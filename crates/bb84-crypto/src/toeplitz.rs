//! GF(2) Toeplitz matrices.

use bb84_bits::BitVec;

use crate::error::ShapeError;

/// An `m x n` matrix over GF(2) whose diagonals are all constant,
/// described by a single seed vector of at least `m + n - 1` bits running
/// from the bottom-left diagonal to the top-right.
///
/// Row `r` of the matrix is `seed[m-1-r .. m-1-r+n]`. A uniformly random
/// seed makes `x -> Ax` a universal family of hash functions, which is
/// what qualifies it both as a MAC hash and as a strong randomness
/// extractor.
#[derive(Debug, Clone, Copy)]
pub struct Toeplitz<'a> {
    seed: &'a BitVec,
    m: usize,
    n: usize,
}

impl<'a> Toeplitz<'a> {
    /// Describe an `m x n` Toeplitz matrix over `seed`.
    ///
    /// The seed length is checked at multiplication time, so that one
    /// long-lived seed can back matrices of varying width.
    #[must_use]
    pub fn new(seed: &'a BitVec, m: usize, n: usize) -> Self {
        Self { seed, m, n }
    }

    /// Output dimension.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.m
    }

    /// Input dimension.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.n
    }

    /// Compute the matrix-vector product `A * vec` over GF(2).
    ///
    /// Output bit `r` is the parity of `seed[m-1-r .. m-1-r+n] AND vec`;
    /// bit 0 of the result is row 0.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::SeedTooShort`] if the seed holds fewer than
    /// `m + n - 1` bits, and [`ShapeError::DimMismatch`] if
    /// `vec.len() != n`.
    pub fn mul(&self, vec: &BitVec) -> Result<BitVec, ShapeError> {
        let need = (self.m + self.n).saturating_sub(1);
        if self.seed.len() < need {
            return Err(ShapeError::SeedTooShort {
                have: self.seed.len(),
                need,
            });
        }
        if vec.len() != self.n {
            return Err(ShapeError::DimMismatch {
                m: self.m,
                n: self.n,
                dim: vec.len(),
            });
        }

        let mut out = BitVec::empty();
        for r in 0..self.m {
            let row = self.seed.slice(self.m - 1 - r, self.m - 1 - r + self.n)?;
            out.push(row.dot(vec));
        }
        Ok(out)
    }
}

/// Hash `input` down to `out_bits` bits with the Toeplitz family member
/// selected by `seed`.
///
/// This one spelling serves all three uses in the protocol: MAC tags
/// (`out_bits` = τ), the error-correction verification hash, and privacy
/// amplification (`out_bits` = final key length).
///
/// # Errors
///
/// Returns a [`ShapeError`] if the seed is shorter than
/// `out_bits + input.len() - 1` bits.
pub fn toeplitz_hash(seed: &BitVec, input: &BitVec, out_bits: usize) -> Result<BitVec, ShapeError> {
    Toeplitz::new(seed, out_bits, input.len()).mul(input)
}
