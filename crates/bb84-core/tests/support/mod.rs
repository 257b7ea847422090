//! Shared fixtures: an in-memory duplex byte pipe and peer builders.

// Each integration-test crate pulls in the subset it needs.
#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::sync::mpsc;

use bb84_core::{PulseAttrs, WinnowConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// One end of an in-memory bidirectional byte stream.
///
/// Reads block until the other end writes; dropping an end makes the
/// peer's next read fail, which is how tests unstick a deadlocked
/// exchange.
pub struct PipeEnd {
    tx: mpsc::Sender<Vec<u8>>,
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
    consumed: usize,
}

/// A connected pair of in-memory stream ends.
pub fn duplex() -> (PipeEnd, PipeEnd) {
    let (atx, brx) = mpsc::channel();
    let (btx, arx) = mpsc::channel();
    (
        PipeEnd {
            tx: atx,
            rx: arx,
            pending: Vec::new(),
            consumed: 0,
        },
        PipeEnd {
            tx: btx,
            rx: brx,
            pending: Vec::new(),
            consumed: 0,
        },
    )
}

impl Read for PipeEnd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.consumed == self.pending.len() {
            self.pending = self
                .rx
                .recv()
                .map_err(|_| io::Error::new(io::ErrorKind::UnexpectedEof, "peer hung up"))?;
            self.consumed = 0;
        }
        let n = buf.len().min(self.pending.len() - self.consumed);
        buf[..n].copy_from_slice(&self.pending[self.consumed..self.consumed + n]);
        self.consumed += n;
        Ok(n)
    }
}

impl Write for PipeEnd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer hung up"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The decoy intensities and proportions used across the integration
/// tests.
pub fn pulse_attrs() -> PulseAttrs {
    PulseAttrs {
        mu_lo: 0.05,
        mu_med: 0.1,
        mu_hi: 0.3,
        prob_lo: 0.4,
        prob_med: 0.3,
        prob_hi: 0.3,
    }
}

/// A Winnow schedule suited to a few percent QBER.
pub fn winnow_schedule() -> Vec<u32> {
    vec![3, 3, 3, 4, 6, 7, 7, 7]
}

/// Winnow configuration with the synchronized PRNG at a fixed seed; both
/// peers must build theirs from the same seed.
pub fn winnow_config(seed: u64) -> WinnowConfig {
    WinnowConfig {
        sync_rng: Box::new(ChaCha8Rng::seed_from_u64(seed)),
        iters: winnow_schedule(),
    }
}

/// A shared bootstrap secret large enough for one round's MAC seed and
/// every one-time pad.
pub fn bootstrap_secret(len: usize) -> Vec<u8> {
    let mut secret = vec![0u8; len];
    getrandom::fill(&mut secret).expect("os entropy");
    secret
}
