//! # BB84 Core
//!
//! Classical post-processing for decoy-state BB84 quantum key
//! distribution. Two peers — a sender and a receiver joined by a quantum
//! channel and an authenticated classical side channel — distill a short
//! shared secret key from a large pool of correlated, noisy raw bits.
//!
//! This crate provides:
//! - Sifting with decoy-state bookkeeping
//! - Decoy-state parameter estimation (Hoeffding-bounded vacuum and
//!   single-photon yields, phase-error rate, safe key length)
//! - Information reconciliation via the Winnow algorithm
//! - Correctness verification and privacy amplification through the
//!   Toeplitz universal hash
//! - A framed classical channel where every message carries a
//!   one-time-padded Toeplitz MAC
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Peer                                │
//! │   (sift → estimate → reconcile → verify → extract)           │
//! ├──────────────────────────────────────────────────────────────┤
//! │     Winnow        Estimator        Toeplitz extractor        │
//! ├──────────────────────────────────────────────────────────────┤
//! │                       AuthFramer                             │
//! │   (length-prefixed frames, Toeplitz-OTP MAC per frame)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The quantum side is abstracted behind the [`photon`] traits; a
//! simulated decoy-state channel for tests lives in [`photon::sim`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod error;
pub mod estimate;
pub mod framer;
pub mod peer;
pub mod photon;
pub mod sift;
pub mod stats;
pub mod winnow;
pub mod wire;

pub use bb84_bits::BitVec;
pub use config::{Channel, ConfigError, PeerConfig, PulseAttrs, Role, WinnowConfig};
pub use error::{Error, ProtocolError};
pub use framer::AuthFramer;
pub use peer::{Peer, Phase};
pub use stats::Stats;
pub use winnow::{Reconciled, Reconciler, Winnow};

/// Default bytes of raw pulses per sift round.
pub const DEFAULT_MEASUREMENT_BATCH_BYTES: usize = 16_384;

/// Default minimum sifted main-basis bits before post-processing starts.
pub const DEFAULT_MAIN_BLOCK_SIZE: usize = 100_000;

/// Default minimum sifted test-basis bits before post-processing starts.
pub const DEFAULT_TEST_BLOCK_SIZE: usize = 100_000;

/// Default security parameter for authentication, correctness and privacy.
pub const DEFAULT_EPSILON: f64 = 1e-12;
