//! Per-round protocol orchestration.

use bb84_bits::{bytes_for, BitVec};
use bb84_crypto::{toeplitz_hash, ToeplitzMac};
use rand::RngCore;
use tracing::debug;

use crate::config::{PeerConfig, PulseAttrs, Role};
use crate::error::{Error, ProtocolError};
use crate::estimate;
use crate::framer::AuthFramer;
use crate::photon;
use crate::sift::{sift, SiftGroup};
use crate::stats::Stats;
use crate::winnow::{Reconciler, Winnow};
use crate::wire::{BasisAnnouncement, EcFinished, IntensityMasks, Message};

/// Where a round currently stands. Fatal errors park the peer in
/// `Failed`; a fresh `negotiate_key` call starts over from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No round in progress.
    Idle,
    /// Accumulating and sifting measurement batches.
    Acquiring,
    /// Running decoy-state parameter estimation.
    Estimating,
    /// Running information reconciliation.
    Reconciling,
    /// Exchanging correctness-check hashes.
    Verifying,
    /// Running privacy amplification.
    Extracting,
    /// Last round completed successfully.
    Done,
    /// Last round ended in a fatal error.
    Failed,
}

/// One legitimate participant in a BB84 key exchange.
///
/// Constructed from a [`PeerConfig`]; each [`negotiate_key`] call runs
/// one full round of sifting, estimation, reconciliation, verification
/// and privacy amplification against the peer on the other end of the
/// classical channel.
///
/// [`negotiate_key`]: Peer::negotiate_key
pub struct Peer {
    role: Role,
    link: AuthFramer,
    rng: Box<dyn RngCore + Send>,
    reconciler: Box<dyn Reconciler + Send>,
    batch_bytes: usize,
    main_block: usize,
    test_block: usize,
    eps_correct: f64,
    eps_privacy: f64,
    pulse: PulseAttrs,
    phase: Phase,
}

impl Peer {
    /// Validate `config` and construct the peer.
    ///
    /// Construction consumes `max(5 * (batch_bytes + 4), 2 * (main_block
    /// + 4)) + 48` bytes of the bootstrap secret to seed the MAC; the
    /// remainder of the stream is drawn on as one-time pad, `ceil(tau /
    /// 8)` bytes per message, where `tau = ceil(log2(1 / eps_auth))`.
    ///
    /// # Errors
    ///
    /// `Config` for violated invariants, `Io` if the bootstrap secret
    /// cannot supply the MAC seed.
    pub fn new(config: PeerConfig) -> Result<Self, Error> {
        config.validate()?;
        let PeerConfig {
            role,
            channel,
            rand,
            mut secret,
            batch_bytes,
            main_block,
            test_block,
            eps_auth,
            eps_correct,
            eps_privacy,
            pulse,
            winnow,
        } = config;

        let seed_bytes = (5 * (batch_bytes + 4)).max(2 * (main_block + 4)) + 48;
        let mut seed = vec![0u8; seed_bytes];
        secret.read_exact(&mut seed)?;
        let tau = (1.0 / eps_auth).log2().ceil() as usize;
        let mac = ToeplitzMac::new(BitVec::from_packed(&seed), tau);

        let announcer = matches!(role, Role::Sender(_));
        Ok(Self {
            role,
            link: AuthFramer::new(channel, secret, mac),
            rng: rand,
            reconciler: Box::new(Winnow::new(winnow, announcer)),
            batch_bytes,
            main_block,
            test_block,
            eps_correct,
            eps_privacy,
            pulse,
            phase: Phase::Idle,
        })
    }

    /// Where the current (or last) round stands.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run one round of key negotiation, returning the shared secret key
    /// and the round's statistics.
    ///
    /// Blocks on the classical channel at every protocol exchange; run
    /// the two peers concurrently. Callers wanting timeouts close the
    /// channel from outside.
    ///
    /// # Errors
    ///
    /// Any [`Error`] is fatal to the round. [`Error::InsufficientKey`]
    /// and transient [`Error::Io`] rounds may be retried with a fresh
    /// round; authentication and verification failures should end the
    /// session.
    pub fn negotiate_key(&mut self) -> Result<(BitVec, Stats), Error> {
        let mut stats = Stats::default();
        let before = self.link.traffic();
        let result = self.run_round(&mut stats);

        let after = self.link.traffic();
        stats.messages_sent = after.messages_sent - before.messages_sent;
        stats.messages_received = after.messages_received - before.messages_received;
        stats.bytes_sent = after.bytes_sent - before.bytes_sent;
        stats.bytes_read = after.bytes_read - before.bytes_read;

        match result {
            Ok(key) => {
                self.phase = Phase::Done;
                Ok((key, stats))
            }
            Err(e) => {
                self.phase = Phase::Failed;
                Err(e)
            }
        }
    }

    fn run_round(&mut self, stats: &mut Stats) -> Result<BitVec, Error> {
        self.phase = Phase::Acquiring;
        let mut main = SiftGroup::default();
        let mut test = SiftGroup::default();
        let mut errors = SiftGroup::default();

        while main.all.len() < self.main_block || test.all.len() < self.test_block {
            let (m, t, e) = match &mut self.role {
                Role::Sender(source) => {
                    let batch = source.next(self.batch_bytes)?;
                    stats.pulses += batch.bits.len() * 8;
                    sift_as_sender(&mut self.link, &batch)?
                }
                Role::Receiver(detector) => {
                    let batch = detector.next(self.batch_bytes)?;
                    stats.pulses += batch.bits.len() * 8;
                    sift_as_receiver(&mut self.link, &batch)?
                }
            };
            stats.sifted_bits += m.all.len() + t.all.len();
            main.append(&m);
            test.append(&t);
            errors.append(&e);
            debug!(
                main = main.all.len(),
                test = test.all.len(),
                pulses = stats.pulses,
                "batch sifted"
            );
        }

        self.phase = Phase::Estimating;
        let safe = estimate::safe_key_len(
            &main,
            &test,
            &errors,
            &self.pulse,
            self.eps_privacy,
            self.eps_correct,
            stats,
        );

        self.phase = Phase::Reconciling;
        let reconciled = self
            .reconciler
            .reconcile(std::mem::take(&mut main.all), &mut self.link)?;
        let leaked = reconciled.leaked_bits as i64;
        if safe < leaked {
            return Err(Error::InsufficientKey { safe, leaked });
        }
        let key_len = (safe - leaked).min(reconciled.corrected.len() as i64);
        if key_len <= 0 {
            return Err(Error::InsufficientKey { safe, leaked });
        }
        let key_len = key_len as usize;

        self.phase = Phase::Verifying;
        let extract_seed = match &self.role {
            Role::Sender(_) => finish_as_announcer(
                &mut self.link,
                self.rng.as_mut(),
                &reconciled.corrected,
                key_len,
                self.eps_correct,
            )?,
            Role::Receiver(_) => finish_as_fixer(&mut self.link, &reconciled.corrected)?,
        };

        self.phase = Phase::Extracting;
        let key = toeplitz_hash(&extract_seed, &reconciled.corrected, key_len)?;
        debug!(key_bits = key.len(), "round complete");
        Ok(key)
    }
}

/// The sender half of one sift round: receive the receiver's
/// announcement, discard undetected pulses, answer with bases, test bits
/// and intensity masks, then partition locally.
fn sift_as_sender(
    link: &mut AuthFramer,
    batch: &photon::SenderBatch,
) -> Result<(SiftGroup, SiftGroup, SiftGroup), Error> {
    let announcement = link.recv()?.into_basis()?;
    let dropped = announcement
        .dropped
        .ok_or(ProtocolError::MissingField("dropped"))?;
    let received = dropped.not();

    let bits = BitVec::from_packed(&batch.bits).select(&received);
    let bases = BitVec::from_packed(&batch.bases).select(&received);
    let lo = BitVec::from_packed(&batch.lo).select(&received);
    let med = BitVec::from_packed(&batch.med).select(&received);
    let hi = BitVec::from_packed(&batch.hi).select(&received);
    let test_bits = bits.and(&bases);

    link.send(&Message::Basis(BasisAnnouncement {
        bases: bases.clone(),
        test_bits: test_bits.clone(),
        dropped: None,
        intensities: Some(IntensityMasks {
            lo: lo.clone(),
            med: med.clone(),
            hi: hi.clone(),
        }),
    }))?;

    Ok(sift(
        &bits,
        &announcement.test_bits,
        &bases,
        &announcement.bases,
        &lo,
        &med,
        &hi,
    ))
}

/// The receiver half of one sift round: drop undetected pulses, announce
/// bases, drop mask and test bits first, then partition with the
/// sender's reply.
fn sift_as_receiver(
    link: &mut AuthFramer,
    batch: &photon::ReceiverBatch,
) -> Result<(SiftGroup, SiftGroup, SiftGroup), Error> {
    let dropped = BitVec::from_packed(&batch.dropped);
    let received = dropped.not();
    let bits = BitVec::from_packed(&batch.bits).select(&received);
    let bases = BitVec::from_packed(&batch.bases).select(&received);
    let test_bits = bits.and(&bases);

    link.send(&Message::Basis(BasisAnnouncement {
        bases: bases.clone(),
        test_bits: test_bits.clone(),
        dropped: Some(dropped),
        intensities: None,
    }))?;

    let announcement = link.recv()?.into_basis()?;
    let masks = announcement
        .intensities
        .ok_or(ProtocolError::MissingField("intensities"))?;

    Ok(sift(
        &bits,
        &announcement.test_bits,
        &bases,
        &announcement.bases,
        &masks.lo,
        &masks.med,
        &masks.hi,
    ))
}

/// The announcer's verification: draw both seeds, send them with our
/// hash, and require the peer's hash to match.
fn finish_as_announcer(
    link: &mut AuthFramer,
    rng: &mut (dyn RngCore + Send),
    key_material: &BitVec,
    target_len: usize,
    eps_correct: f64,
) -> Result<BitVec, Error> {
    let verify_bits = (1.0 / eps_correct).log2().ceil() as usize;
    let mut verify_seed = vec![0u8; bytes_for(key_material.len() + verify_bits - 1)];
    rng.fill_bytes(&mut verify_seed);
    let ours = toeplitz_hash(
        &BitVec::from_packed(&verify_seed),
        key_material,
        verify_bits,
    )?;

    let mut extract_seed = vec![0u8; bytes_for(key_material.len() + target_len - 1)];
    rng.fill_bytes(&mut extract_seed);

    link.send(&Message::EcFinished(EcFinished {
        extract_seed: Some(extract_seed.clone()),
        verify_seed: Some(verify_seed),
        verify_hash: ours.clone(),
    }))?;
    let reply = link.recv()?.into_ec_finished()?;
    if reply.verify_hash != ours {
        return Err(Error::Verification);
    }
    Ok(BitVec::from_packed(&extract_seed))
}

/// The fixer's verification: hash our key material under the announcer's
/// seed, answer with the hash, and require it to match the announcer's.
fn finish_as_fixer(link: &mut AuthFramer, key_material: &BitVec) -> Result<BitVec, Error> {
    let finished = link.recv()?.into_ec_finished()?;
    let verify_seed = finished
        .verify_seed
        .ok_or(ProtocolError::MissingField("verify_seed"))?;
    let extract_seed = finished
        .extract_seed
        .ok_or(ProtocolError::MissingField("extract_seed"))?;

    let ours = toeplitz_hash(
        &BitVec::from_packed(&verify_seed),
        key_material,
        finished.verify_hash.len(),
    )?;
    link.send(&Message::EcFinished(EcFinished {
        extract_seed: None,
        verify_seed: None,
        verify_hash: ours.clone(),
    }))?;
    if ours != finished.verify_hash {
        return Err(Error::Verification);
    }
    Ok(BitVec::from_packed(&extract_seed))
}
