//! Error types for key negotiation.
//!
//! Every variant of [`Error`] other than `Io` is fatal to the round and
//! is never retried inside the core; an embedding application may retry
//! transient I/O failures by starting a fresh round over a new session.

use bb84_crypto::ShapeError;
use thiserror::Error;

use crate::config::ConfigError;

/// Top-level negotiation errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The peer was configured with nonsensical options.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The classical channel or a backing stream failed.
    #[error("channel i/o: {0}")]
    Io(#[from] std::io::Error),

    /// MAC verification failed on an incoming frame.
    #[error("message authentication failed on incoming frame")]
    MacInvalid,

    /// The peer sent something other than what the protocol step expects.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// The correctness-check hashes disagreed after reconciliation.
    #[error("error correction failed verification")]
    Verification,

    /// No extractable key remains once reconciliation leakage is paid for.
    /// Fatal for the round, not for the session.
    #[error("cannot make a safe key: safe length {safe}, reconciliation leaked {leaked}")]
    InsufficientKey {
        /// Safe key length from parameter estimation, in bits.
        safe: i64,
        /// Bits disclosed during reconciliation.
        leaked: i64,
    },

    /// A hash was driven with impossible dimensions; indicates a bug.
    #[error("hash dimensions: {0}")]
    Shape(#[from] ShapeError),
}

/// Violations of the expected message sequence or shape.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A well-formed message arrived out of protocol order.
    #[error("unexpected message: expected {expected}, got {got}")]
    UnexpectedMessage {
        /// Message the current step requires.
        expected: &'static str,
        /// Message actually received.
        got: &'static str,
    },

    /// The peers disagree on how many blocks are being reconciled.
    #[error("reconciling bitstrings of different block counts: {local} != {remote}")]
    BlockCountMismatch {
        /// Blocks on this side.
        local: usize,
        /// Blocks announced by the peer.
        remote: usize,
    },

    /// The announcer sent a different number of syndromes than requested.
    #[error("reconciling syndromes of different block counts: {local} != {remote}")]
    SyndromeCountMismatch {
        /// Syndromes this side expects.
        local: usize,
        /// Syndromes the peer announced.
        remote: usize,
    },

    /// An optional field required by this peer's role was absent.
    #[error("message is missing required field {0}")]
    MissingField(&'static str),

    /// The message tag byte is not one this protocol defines.
    #[error("unknown message tag 0x{0:02X}")]
    UnknownTag(u8),

    /// The payload ended in the middle of a field.
    #[error("message truncated while reading {0}")]
    Truncated(&'static str),

    /// The payload kept going after the last field.
    #[error("message carries {0} trailing bytes")]
    TrailingBytes(usize),

    /// A frame header announced an implausibly large payload.
    #[error("frame of {got} bytes exceeds the {limit}-byte limit")]
    Oversized {
        /// Announced payload size.
        got: usize,
        /// Hard cap on frame payloads.
        limit: usize,
    },
}
