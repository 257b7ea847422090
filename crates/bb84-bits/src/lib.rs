//! # BB84 Bits
//!
//! Densely-packed bit vectors for QKD post-processing.
//!
//! This crate provides [`BitVec`], a bit array tuned for the access
//! patterns of sifting, reconciliation and privacy amplification:
//!
//! - Bitwise operations (`and`/`or`/`xor`/`xnor`/`not`) over operands of
//!   different lengths, with an implicit-fill flag so that the complement
//!   of a bounded vector keeps behaving correctly under later mixed-length
//!   operations
//! - Masked selection and bit-offset slicing
//! - Synchronized Fisher-Yates shuffling from a caller-supplied RNG
//! - A canonical wire form (`u32` little-endian bit length + packed bytes)
//!
//! Bit `i` of a vector lives in byte `i / 8` at bit position `i % 8`
//! (little-endian within bytes).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

mod dense;
mod error;
mod ops;

pub use dense::BitVec;
pub use error::BitsError;

/// Number of bytes needed to hold `bits` bits.
#[must_use]
pub const fn bytes_for(bits: usize) -> usize {
    (bits + 7) / 8
}
