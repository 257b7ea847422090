//! Peer configuration and validation.

use std::fmt;
use std::io::Read;

use rand::RngCore;
use thiserror::Error;

use crate::photon;
use crate::{
    DEFAULT_EPSILON, DEFAULT_MAIN_BLOCK_SIZE, DEFAULT_MEASUREMENT_BATCH_BYTES,
    DEFAULT_TEST_BLOCK_SIZE,
};

/// A bidirectional classical byte stream between the two peers.
///
/// The core never interprets transport details; anything readable and
/// writable works — a TCP stream, a Unix socket, an in-memory pipe.
pub trait Channel: Read + std::io::Write + Send {}

impl<T: Read + std::io::Write + Send + ?Sized> Channel for T {}

/// Which half of the protocol this peer runs, with its quantum-side
/// endpoint.
///
/// The variant picks the orchestration path; sifting, estimation,
/// reconciliation and extraction are shared between the two.
pub enum Role {
    /// The sender side (conventionally A). Announces syndromes during
    /// reconciliation and the seeds during verification.
    Sender(Box<dyn photon::Sender + Send>),
    /// The receiver side (conventionally B). Announces its basis choices
    /// first and applies syndrome fixes.
    Receiver(Box<dyn photon::Receiver + Send>),
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Sender(_) => "Role::Sender",
            Role::Receiver(_) => "Role::Receiver",
        })
    }
}

/// Mean photon numbers and preparation probabilities of the three decoy
/// intensities.
#[derive(Debug, Clone, Copy)]
pub struct PulseAttrs {
    /// Mean photons per pulse of the low-intensity preparation.
    pub mu_lo: f64,
    /// Mean photons per pulse of the medium-intensity preparation.
    pub mu_med: f64,
    /// Mean photons per pulse of the high-intensity preparation.
    pub mu_hi: f64,
    /// Probability a pulse is prepared at low intensity.
    pub prob_lo: f64,
    /// Probability a pulse is prepared at medium intensity.
    pub prob_med: f64,
    /// Probability a pulse is prepared at high intensity.
    pub prob_hi: f64,
}

impl PulseAttrs {
    /// Check the decoy-state invariants:
    /// `0 <= mu_lo < mu_med < mu_hi`, `mu_lo + mu_med < mu_hi`, and the
    /// probabilities sum to 1.
    ///
    /// The intensity constraints also keep the estimator's denominators
    /// strictly positive.
    ///
    /// # Errors
    ///
    /// Returns the violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (lo, med, hi) = (self.mu_lo, self.mu_med, self.mu_hi);
        if !(0.0 <= lo && lo < med && med < hi) {
            return Err(ConfigError::IntensityOrder { lo, med, hi });
        }
        if lo + med >= hi {
            return Err(ConfigError::IntensitySum { lo, med, hi });
        }
        let sum = self.prob_lo + self.prob_med + self.prob_hi;
        if !(self.prob_lo > 0.0 && self.prob_med > 0.0 && self.prob_hi > 0.0)
            || (sum - 1.0).abs() > 1e-9
        {
            return Err(ConfigError::ProbabilitySum { sum });
        }
        Ok(())
    }
}

/// Parameters for Winnow reconciliation.
pub struct WinnowConfig {
    /// Synchronized randomness for the de-correlating shuffles. Both
    /// peers must seed this identically and it must not be used for
    /// anything else; it may be a PRNG, since it protects no secrets.
    pub sync_rng: Box<dyn RngCore + Send>,

    /// Hamming parity-bit counts per iteration; an entry `h` reconciles
    /// blocks of `2^h` bits. E.g. `[3, 3, 4]` runs two passes with 8-bit
    /// blocks, then one with 16-bit blocks.
    pub iters: Vec<u32>,
}

/// Everything needed to construct a [`Peer`](crate::Peer).
///
/// Build one with [`PeerConfig::new`] and adjust the public knobs before
/// handing it to `Peer::new`, which validates.
pub struct PeerConfig {
    /// Role selection plus the quantum-side endpoint.
    pub role: Role,

    /// The classical side channel.
    pub channel: Box<dyn Channel>,

    /// General-purpose randomness, used for salting hashes. For
    /// unconditional security this should be a true random source.
    pub rand: Box<dyn RngCore + Send>,

    /// Bootstrap shared secret, identical on both peers. Construction
    /// draws the MAC seed from it; afterwards every authenticated message
    /// consumes `ceil(tau / 8)` bytes of one-time pad.
    pub secret: Box<dyn Read + Send>,

    /// Raw pulse bytes exchanged per sift round.
    pub batch_bytes: usize,

    /// Minimum sifted main-basis bits before post-processing.
    pub main_block: usize,

    /// Minimum sifted test-basis bits before post-processing.
    pub test_block: usize,

    /// Acceptable probability of a forged classical message.
    pub eps_auth: f64,

    /// Acceptable probability that the peers finish with different keys.
    pub eps_correct: f64,

    /// Acceptable statistical distance of the final key from uniform.
    pub eps_privacy: f64,

    /// Decoy-state pulse attributes.
    pub pulse: PulseAttrs,

    /// Winnow schedule and synchronized randomness.
    pub winnow: WinnowConfig,
}

impl PeerConfig {
    /// Assemble a configuration with the required collaborators and
    /// defaults for every tunable.
    #[must_use]
    pub fn new(
        role: Role,
        channel: Box<dyn Channel>,
        rand: Box<dyn RngCore + Send>,
        secret: Box<dyn Read + Send>,
        pulse: PulseAttrs,
        winnow: WinnowConfig,
    ) -> Self {
        Self {
            role,
            channel,
            rand,
            secret,
            batch_bytes: DEFAULT_MEASUREMENT_BATCH_BYTES,
            main_block: DEFAULT_MAIN_BLOCK_SIZE,
            test_block: DEFAULT_TEST_BLOCK_SIZE,
            eps_auth: DEFAULT_EPSILON,
            eps_correct: DEFAULT_EPSILON,
            eps_privacy: DEFAULT_EPSILON,
            pulse,
            winnow,
        }
    }

    /// Check every invariant that does not require touching the
    /// collaborators.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("eps_auth", self.eps_auth),
            ("eps_correct", self.eps_correct),
            ("eps_privacy", self.eps_privacy),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::Epsilon { name, value });
            }
        }
        if self.batch_bytes == 0 {
            return Err(ConfigError::EmptyBatch);
        }
        if self.main_block == 0 || self.test_block == 0 {
            return Err(ConfigError::BlockSize {
                main: self.main_block,
                test: self.test_block,
            });
        }
        self.pulse.validate()?;
        if self.winnow.iters.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }
        if let Some(&h) = self.winnow.iters.iter().find(|&&h| !(1..=15).contains(&h)) {
            return Err(ConfigError::HammingBits(h));
        }
        Ok(())
    }
}

/// Rejected configurations.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Intensities out of order.
    #[error("pulse intensities must satisfy 0 <= lo < med < hi, got ({lo}, {med}, {hi})")]
    IntensityOrder {
        /// Low intensity.
        lo: f64,
        /// Medium intensity.
        med: f64,
        /// High intensity.
        hi: f64,
    },

    /// Low and medium intensities together reach the high intensity.
    #[error("pulse intensities must satisfy lo + med < hi, got {lo} + {med} >= {hi}")]
    IntensitySum {
        /// Low intensity.
        lo: f64,
        /// Medium intensity.
        med: f64,
        /// High intensity.
        hi: f64,
    },

    /// Preparation probabilities are not a distribution.
    #[error("decoy state proportions must be positive and sum to one, got {sum}")]
    ProbabilitySum {
        /// Observed sum.
        sum: f64,
    },

    /// A security parameter is outside (0, 1). Each epsilon is validated
    /// independently; none substitutes for another.
    #[error("{name} must lie in (0, 1), got {value}")]
    Epsilon {
        /// Which epsilon.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Zero-byte measurement batches cannot make progress.
    #[error("measurement batch must be non-empty")]
    EmptyBatch,

    /// Block thresholds must be positive.
    #[error("block sizes must be positive, got main {main}, test {test}")]
    BlockSize {
        /// Main-basis threshold.
        main: usize,
        /// Test-basis threshold.
        test: usize,
    },

    /// Winnow needs at least one iteration.
    #[error("winnow schedule must be non-empty")]
    EmptySchedule,

    /// A Winnow iteration's Hamming bit count is unusable.
    #[error("winnow iteration uses {0} hamming bits, supported range is 1..=15")]
    HammingBits(u32),
}
