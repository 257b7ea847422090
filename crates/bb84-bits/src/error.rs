//! Error types for bit-vector operations.

use thiserror::Error;

/// Errors raised by bit-vector slicing and serialization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitsError {
    /// Slice bounds do not fit the vector.
    #[error("slice [{start}, {end}) out of range for bit vector of {len} bits")]
    SliceRange {
        /// Requested start bit (inclusive).
        start: usize,
        /// Requested end bit (exclusive).
        end: usize,
        /// Length of the vector being sliced.
        len: usize,
    },

    /// Serialized form is shorter than its length header claims.
    #[error("serialized bit vector truncated: need {expect} payload bytes, have {have}")]
    Truncated {
        /// Bytes the header promises.
        expect: usize,
        /// Bytes actually present.
        have: usize,
    },

    /// Serialized form is missing its 4-byte length header.
    #[error("serialized bit vector missing length header")]
    MissingHeader,

    /// A bit-string literal contained something other than '0', '1' or ' '.
    #[error("invalid character {0:?} in bit string")]
    BadChar(char),
}
