//! A simulated decoy-state quantum channel.
//!
//! The pair models the parts of the physics the post-processing cares
//! about: basis-biased preparation, three-intensity decoy scheduling,
//! Poisson photon statistics at the detector (a pulse that arrives with
//! zero photons is dropped), and mismatched-basis measurements collapsing
//! to a fair coin. Reproducible impairments are injected through the
//! receiver's public `errors` and `drops` masks, applied positionally to
//! every batch.
//!
//! Both halves run on seeded PRNGs, so a given option set replays
//! identically; tests rely on that.

use std::io;
use std::sync::mpsc;

use bb84_bits::BitVec;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson};

use crate::config::PulseAttrs;
use crate::photon::{Receiver, ReceiverBatch, Sender, SenderBatch};

/// Parameters for a simulated channel pair.
#[derive(Debug, Clone, Copy)]
pub struct SimOptions {
    /// Probability that either side prepares/measures in the main basis.
    pub p_main: f64,
    /// Decoy intensities and preparation probabilities.
    pub pulse: PulseAttrs,
    /// Seed for the sender's preparation PRNG.
    pub sender_seed: u64,
    /// Seed for the receiver's measurement PRNG.
    pub receiver_seed: u64,
}

/// Build a connected simulated `(Sender, Receiver)` pair.
///
/// Each `Sender::next` call must be matched by one `Receiver::next` call
/// with the same byte count; the queue between them buffers a few batches
/// before the sender blocks.
#[must_use]
pub fn pair(options: SimOptions) -> (SimSender, SimReceiver) {
    let (tx, rx) = mpsc::sync_channel(4);
    let sender = SimSender {
        tx,
        rng: ChaCha8Rng::seed_from_u64(options.sender_seed),
        p_main: options.p_main,
        pulse: options.pulse,
    };
    let receiver = SimReceiver {
        rx,
        rng: ChaCha8Rng::seed_from_u64(options.receiver_seed),
        p_main: options.p_main,
        pulse: options.pulse,
        errors: BitVec::empty(),
        drops: BitVec::empty(),
    };
    (sender, receiver)
}

// What travels over the simulated fiber: everything the detector's
// physics depends on.
struct Pulses {
    bits: BitVec,
    bases: BitVec,
    lo: BitVec,
    med: BitVec,
    hi: BitVec,
}

/// The transmitting half of a simulated channel.
pub struct SimSender {
    tx: mpsc::SyncSender<Pulses>,
    rng: ChaCha8Rng,
    p_main: f64,
    pulse: PulseAttrs,
}

impl Sender for SimSender {
    fn next(&mut self, bytes: usize) -> io::Result<SenderBatch> {
        let n = bytes * 8;
        let mut bits = BitVec::empty();
        let mut bases = BitVec::empty();
        let mut lo = BitVec::empty();
        let mut med = BitVec::empty();
        let mut hi = BitVec::empty();

        for _ in 0..n {
            bits.push(self.rng.random_bool(0.5));
            bases.push(!self.rng.random_bool(self.p_main));
            let u: f64 = self.rng.random();
            lo.push(u < self.pulse.prob_lo);
            med.push(self.pulse.prob_lo <= u && u < self.pulse.prob_lo + self.pulse.prob_med);
            hi.push(self.pulse.prob_lo + self.pulse.prob_med <= u);
        }

        let batch = SenderBatch {
            bits: bits.packed(),
            bases: bases.packed(),
            lo: lo.packed(),
            med: med.packed(),
            hi: hi.packed(),
        };
        self.tx
            .send(Pulses {
                bits,
                bases,
                lo,
                med,
                hi,
            })
            .map_err(|_| {
                io::Error::new(io::ErrorKind::BrokenPipe, "simulated receiver went away")
            })?;
        Ok(batch)
    }
}

/// The detecting half of a simulated channel.
pub struct SimReceiver {
    rx: mpsc::Receiver<Pulses>,
    rng: ChaCha8Rng,
    p_main: f64,
    pulse: PulseAttrs,

    /// Measurement flips injected on top of the physics, applied
    /// positionally to every batch. Positions past the mask are clean.
    pub errors: BitVec,

    /// Detection losses injected on top of the Poisson statistics,
    /// applied positionally to every batch.
    pub drops: BitVec,
}

impl Receiver for SimReceiver {
    fn next(&mut self, bytes: usize) -> io::Result<ReceiverBatch> {
        let sent = self
            .rx
            .recv()
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "simulated sender went away"))?;
        if sent.bits.len() != bytes * 8 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "batch size mismatch: sender pushed {} pulses, receiver expects {}",
                    sent.bits.len(),
                    bytes * 8
                ),
            ));
        }

        let arrivals = Arrivals::new(&self.pulse)?;
        let n = sent.bits.len();
        let mut bits = BitVec::empty();
        let mut bases = BitVec::empty();
        let mut dropped = BitVec::empty();

        for i in 0..n {
            let basis = !self.rng.random_bool(self.p_main);
            bases.push(basis);

            let mu = if sent.lo.get(i) {
                Intensity::Lo
            } else if sent.med.get(i) {
                Intensity::Med
            } else {
                Intensity::Hi
            };
            let photons = arrivals.sample(mu, &mut self.rng);
            dropped.push(photons == 0 || self.drops.get(i));

            let measured = if basis == sent.bases.get(i) {
                sent.bits.get(i)
            } else {
                self.rng.random_bool(0.5)
            };
            bits.push(measured != self.errors.get(i));
        }

        Ok(ReceiverBatch {
            bits: bits.packed(),
            bases: bases.packed(),
            dropped: dropped.packed(),
        })
    }
}

#[derive(Clone, Copy)]
enum Intensity {
    Lo,
    Med,
    Hi,
}

// Photon-count distributions per intensity.
struct Arrivals {
    lo: Option<Poisson<f64>>,
    med: Poisson<f64>,
    hi: Poisson<f64>,
}

impl Arrivals {
    fn new(pulse: &PulseAttrs) -> io::Result<Self> {
        let dist = |mu: f64| {
            Poisson::new(mu)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))
        };
        Ok(Self {
            // mu_lo may legitimately be 0: a vacuum preparation never
            // delivers a photon.
            lo: if pulse.mu_lo > 0.0 {
                Some(dist(pulse.mu_lo)?)
            } else {
                None
            },
            med: dist(pulse.mu_med)?,
            hi: dist(pulse.mu_hi)?,
        })
    }

    fn sample(&self, intensity: Intensity, rng: &mut ChaCha8Rng) -> u64 {
        let dist = match intensity {
            Intensity::Lo => match &self.lo {
                Some(d) => d,
                None => return 0,
            },
            Intensity::Med => &self.med,
            Intensity::Hi => &self.hi,
        };
        dist.sample(rng) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SimOptions {
        SimOptions {
            p_main: 0.5,
            pulse: PulseAttrs {
                mu_lo: 0.05,
                mu_med: 0.1,
                mu_hi: 0.3,
                prob_lo: 0.4,
                prob_med: 0.3,
                prob_hi: 0.3,
            },
            sender_seed: 42,
            receiver_seed: 1337,
        }
    }

    #[test]
    fn test_batch_shapes_and_one_hot_intensity() {
        let (mut tx, mut rx) = pair(options());
        let sent = tx.next(256).unwrap();
        let got = rx.next(256).unwrap();
        assert_eq!(sent.bits.len(), 256);
        assert_eq!(got.bits.len(), 256);
        assert_eq!(got.dropped.len(), 256);

        let lo = BitVec::from_packed(&sent.lo);
        let med = BitVec::from_packed(&sent.med);
        let hi = BitVec::from_packed(&sent.hi);
        for i in 0..2048 {
            let hot =
                usize::from(lo.get(i)) + usize::from(med.get(i)) + usize::from(hi.get(i));
            assert_eq!(hot, 1, "pulse {i} not one-hot");
        }
    }

    #[test]
    fn test_matching_bases_agree_when_detected() {
        let (mut tx, mut rx) = pair(options());
        let sent = tx.next(512).unwrap();
        let got = rx.next(512).unwrap();

        let s_bits = BitVec::from_packed(&sent.bits);
        let s_bases = BitVec::from_packed(&sent.bases);
        let r_bits = BitVec::from_packed(&got.bits);
        let r_bases = BitVec::from_packed(&got.bases);
        let dropped = BitVec::from_packed(&got.dropped);

        let mut checked = 0;
        for i in 0..s_bits.len() {
            if dropped.get(i) || s_bases.get(i) != r_bases.get(i) {
                continue;
            }
            assert_eq!(s_bits.get(i), r_bits.get(i), "pulse {i} flipped unasked");
            checked += 1;
        }
        assert!(checked > 0, "no surviving matched-basis pulses to check");
    }

    #[test]
    fn test_injected_errors_flip_exactly_where_asked() {
        let opts = options();
        let (mut tx_a, mut rx_a) = pair(opts);
        let (mut tx_b, mut rx_b) = pair(opts);
        // identical seeds: the only difference is the error mask
        let mut mask = BitVec::zeros(512 * 8);
        for i in (0..mask.len()).step_by(20) {
            mask.set(i, true);
        }
        rx_b.errors = mask.clone();

        tx_a.next(512).unwrap();
        tx_b.next(512).unwrap();
        let clean = rx_a.next(512).unwrap();
        let dirty = rx_b.next(512).unwrap();

        let delta = BitVec::from_packed(&clean.bits).xor(&BitVec::from_packed(&dirty.bits));
        assert_eq!(delta, mask);
        assert_eq!(clean.dropped, dirty.dropped);
    }

    #[test]
    fn test_injected_drops_add_losses() {
        let opts = options();
        let (mut tx_a, mut rx_a) = pair(opts);
        let (mut tx_b, mut rx_b) = pair(opts);
        let mut mask = BitVec::zeros(512 * 8);
        for i in (0..mask.len()).step_by(7) {
            mask.set(i, true);
        }
        rx_b.drops = mask.clone();

        tx_a.next(512).unwrap();
        tx_b.next(512).unwrap();
        let baseline = BitVec::from_packed(&rx_a.next(512).unwrap().dropped);
        let injected = BitVec::from_packed(&rx_b.next(512).unwrap().dropped);

        assert_eq!(injected, baseline.or(&mask));
    }

    #[test]
    fn test_detection_rate_tracks_intensity() {
        let (mut tx, mut rx) = pair(options());
        let mut survived = [0usize; 3];
        let mut sent_count = [0usize; 3];
        for _ in 0..8 {
            let sent = tx.next(2048).unwrap();
            let got = rx.next(2048).unwrap();
            let lo = BitVec::from_packed(&sent.lo);
            let hi = BitVec::from_packed(&sent.hi);
            let dropped = BitVec::from_packed(&got.dropped);
            for i in 0..lo.len() {
                let k = if lo.get(i) {
                    0
                } else if hi.get(i) {
                    2
                } else {
                    1
                };
                sent_count[k] += 1;
                if !dropped.get(i) {
                    survived[k] += 1;
                }
            }
        }
        let rate = |k: usize| survived[k] as f64 / sent_count[k] as f64;
        assert!(rate(0) < rate(1) && rate(1) < rate(2));
        // detection probability of Poisson(mu) is 1 - e^-mu
        assert!((rate(2) - 0.26).abs() < 0.03, "hi rate {}", rate(2));
    }

    #[test]
    fn test_mismatched_batch_sizes_error() {
        let (mut tx, mut rx) = pair(options());
        tx.next(64).unwrap();
        assert_eq!(
            rx.next(65).unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
    }
}
