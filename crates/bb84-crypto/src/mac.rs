//! One-time-padded Toeplitz message authentication.
//!
//! The tag over a payload is its τ-bit Toeplitz hash XORed with τ bits of
//! one-time pad. With a uniformly random pad per message the tag leaks
//! nothing about the hash seed, so the construction stays secure against
//! computationally unbounded forgers; a forgery succeeds with probability
//! at most 2^-τ.

use bb84_bits::{bytes_for, BitVec};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::ShapeError;
use crate::toeplitz::toeplitz_hash;

/// Authenticator over a long-lived Toeplitz seed shared by both peers.
///
/// The seed is fixed per session; the caller supplies fresh one-time pad
/// bytes for every tag. Both peers must feed pads from identical streams
/// in identical order or verification fails closed.
pub struct ToeplitzMac {
    seed: BitVec,
    tau: usize,
}

impl ToeplitzMac {
    /// Build an authenticator producing `tau`-bit tags over `seed`.
    #[must_use]
    pub fn new(seed: BitVec, tau: usize) -> Self {
        Self { seed, tau }
    }

    /// Tag width in bits.
    #[must_use]
    pub fn tau(&self) -> usize {
        self.tau
    }

    /// Bytes of one-time pad consumed per tag.
    #[must_use]
    pub fn pad_len(&self) -> usize {
        bytes_for(self.tau)
    }

    /// Compute the tag for `payload`, consuming `pad` as one-time pad.
    ///
    /// The pad bytes are zeroized before returning.
    ///
    /// # Errors
    ///
    /// Returns a [`ShapeError`] if the seed cannot cover a payload of this
    /// size, or if `pad` is not exactly [`pad_len`] bytes.
    ///
    /// [`pad_len`]: ToeplitzMac::pad_len
    pub fn tag(&self, payload: &[u8], pad: &mut [u8]) -> Result<Vec<u8>, ShapeError> {
        if pad.len() != self.pad_len() {
            return Err(ShapeError::DimMismatch {
                m: self.tau,
                n: self.pad_len() * 8,
                dim: pad.len() * 8,
            });
        }
        let hash = toeplitz_hash(&self.seed, &BitVec::from_packed(payload), self.tau)?;
        let tag = hash.xor(&BitVec::from_packed(pad));
        pad.zeroize();
        Ok(tag.packed())
    }

    /// Recompute the tag for `payload` and compare it with `tag` in
    /// constant time. The pad bytes are zeroized either way.
    ///
    /// # Errors
    ///
    /// Propagates the same [`ShapeError`]s as [`tag`](ToeplitzMac::tag).
    pub fn verify(&self, payload: &[u8], pad: &mut [u8], tag: &[u8]) -> Result<bool, ShapeError> {
        let mut expect = self.tag(payload, pad)?;
        let ok = expect.len() == tag.len() && bool::from(expect.ct_eq(tag));
        expect.zeroize();
        Ok(ok)
    }
}
