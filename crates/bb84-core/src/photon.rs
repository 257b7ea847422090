//! Quantum-side channel interfaces.
//!
//! The core never touches photons; it consumes batches of measurement
//! results through these traits. Buffers are packed bit arrays, one bit
//! per pulse, little-endian within bytes.

use std::io;

pub mod sim;

/// One batch of transmitted pulses, as seen by the sender.
#[derive(Debug, Clone)]
pub struct SenderBatch {
    /// Logical bit values sent.
    pub bits: Vec<u8>,
    /// Basis per pulse: 0 = main, 1 = test.
    pub bases: Vec<u8>,
    /// One-hot mask of low-intensity pulses.
    pub lo: Vec<u8>,
    /// One-hot mask of medium-intensity pulses.
    pub med: Vec<u8>,
    /// One-hot mask of high-intensity pulses.
    pub hi: Vec<u8>,
}

/// One batch of detected pulses, as seen by the receiver.
#[derive(Debug, Clone)]
pub struct ReceiverBatch {
    /// Logical bit values measured. Meaningless where `dropped` is set.
    pub bits: Vec<u8>,
    /// Basis per pulse: 0 = main, 1 = test.
    pub bases: Vec<u8>,
    /// Pulses that never registered at the detector.
    pub dropped: Vec<u8>,
}

/// Sends qubits encoded as polarized photons to a [`Receiver`].
pub trait Sender {
    /// Transmit the next `bytes`-byte batch of pulses and report what was
    /// sent.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the underlying hardware or simulation
    /// fails; the negotiation round is then abandoned.
    fn next(&mut self, bytes: usize) -> io::Result<SenderBatch>;
}

/// Receives polarized photons and measures each in its own choice of
/// basis.
pub trait Receiver {
    /// Detect the next `bytes`-byte batch of pulses and report the
    /// measurements.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the underlying hardware or simulation
    /// fails; the negotiation round is then abandoned.
    fn next(&mut self, bytes: usize) -> io::Result<ReceiverBatch>;
}
