//! Information reconciliation via the Winnow algorithm
//! (arXiv:quant-ph/0203096).
//!
//! Each iteration shuffles the working vector under a PRNG synchronized
//! between the peers, splits it into `2^h`-bit blocks, and exchanges
//! Hamming SECDED syndromes to fix blocks holding an odd number of
//! errors. Every announced parity bit is then deleted from the vector
//! (privacy maintenance), so leakage is materialized as shortening rather
//! than as a separate accounting entry.

use bb84_bits::BitVec;
use rand::RngCore;
use tracing::{debug, trace};

use crate::config::WinnowConfig;
use crate::error::{Error, ProtocolError};
use crate::framer::AuthFramer;
use crate::wire::{Message, ParityAnnouncement, SyndromeAnnouncement};

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// The corrected key material. Shorter than the input by every bit
    /// the protocol announced.
    pub corrected: BitVec,
    /// Bits of key information disclosed beyond the shortening already
    /// applied to `corrected`. Zero for Winnow.
    pub leaked_bits: usize,
}

/// An information-reconciliation scheme.
///
/// `reconcile` drives the exchange over `link` so that both peers end up
/// holding the same corrected vector with high probability. Corrections
/// are not guaranteed to land on one designated side; correctness is
/// confirmed afterwards by the verification hash exchange.
pub trait Reconciler {
    /// Run one reconciliation pass over `x`.
    ///
    /// # Errors
    ///
    /// Channel failures, MAC failures and block-count disagreements are
    /// all fatal to the round.
    fn reconcile(&mut self, x: BitVec, link: &mut AuthFramer) -> Result<Reconciled, Error>;
}

/// The Winnow reconciler.
pub struct Winnow {
    iters: Vec<u32>,
    rng: Box<dyn RngCore + Send>,
    announcer: bool,
}

impl Winnow {
    /// Build a Winnow pass from its configuration. The `announcer` side
    /// sends full syndromes; the other side applies the fixes.
    #[must_use]
    pub fn new(config: WinnowConfig, announcer: bool) -> Self {
        Self {
            iters: config.iters,
            rng: config.sync_rng,
            announcer,
        }
    }

    fn pass(&mut self, mut x: BitVec, h: u32, link: &mut AuthFramer) -> Result<BitVec, Error> {
        x.shuffle(&mut self.rng);
        let syndromes = block_syndromes(&x, h)?;
        let todo = self.exchange_total_parity(&syndromes, h, link)?;
        trace!(
            blocks = syndromes.len(),
            mismatched = todo.count_ones(),
            h,
            "winnow iteration"
        );
        if let Some(sums) = self.exchange_syndromes(&syndromes, &todo, link)? {
            apply_syndromes(&mut x, &sums, &todo, h);
        }
        Ok(privacy_maintenance(&x, &todo, h))
    }

    /// Swap per-block total parities and return the blocks where they
    /// disagree. The announcer transmits first.
    fn exchange_total_parity(
        &mut self,
        syndromes: &[BitVec],
        h: u32,
        link: &mut AuthFramer,
    ) -> Result<BitVec, Error> {
        let mut parities = BitVec::empty();
        for syn in syndromes {
            parities.push(syn.get(h as usize));
        }
        let msg = Message::Parity(ParityAnnouncement {
            parities: parities.clone(),
        });
        let theirs = if self.announcer {
            link.send(&msg)?;
            link.recv()?.into_parity()?
        } else {
            let theirs = link.recv()?.into_parity()?;
            link.send(&msg)?;
            theirs
        };
        if theirs.parities.len() != parities.len() {
            return Err(ProtocolError::BlockCountMismatch {
                local: parities.len(),
                remote: theirs.parities.len(),
            }
            .into());
        }
        Ok(parities.xor(&theirs.parities))
    }

    /// The announcer sends the full syndromes of the `todo` blocks and
    /// returns `None`; the fixer receives them and returns the per-block
    /// syndrome differences.
    fn exchange_syndromes(
        &mut self,
        syndromes: &[BitVec],
        todo: &BitVec,
        link: &mut AuthFramer,
    ) -> Result<Option<Vec<BitVec>>, Error> {
        let chosen: Vec<&BitVec> = syndromes
            .iter()
            .enumerate()
            .filter(|&(i, _)| todo.get(i))
            .map(|(_, s)| s)
            .collect();
        if self.announcer {
            link.send(&Message::Syndromes(SyndromeAnnouncement {
                syndromes: chosen.into_iter().cloned().collect(),
            }))?;
            return Ok(None);
        }
        let theirs = link.recv()?.into_syndromes()?;
        if theirs.syndromes.len() != chosen.len() {
            return Err(ProtocolError::SyndromeCountMismatch {
                local: chosen.len(),
                remote: theirs.syndromes.len(),
            }
            .into());
        }
        let sums = chosen
            .into_iter()
            .zip(&theirs.syndromes)
            .map(|(ours, theirs)| ours.xor(theirs))
            .collect();
        Ok(Some(sums))
    }
}

impl Reconciler for Winnow {
    fn reconcile(&mut self, x: BitVec, link: &mut AuthFramer) -> Result<Reconciled, Error> {
        let before = x.len();
        let mut x = x;
        for h in self.iters.clone() {
            x = self.pass(x, h, link)?;
        }
        debug!(before, after = x.len(), "reconciliation complete");
        Ok(Reconciled {
            corrected: x,
            leaked_bits: 0,
        })
    }
}

/// SECDED syndromes of consecutive `2^h`-bit blocks of `x`; the final
/// block is zero-padded up to size.
fn block_syndromes(x: &BitVec, h: u32) -> Result<Vec<BitVec>, Error> {
    let n = 1usize << h;
    let mut out = Vec::with_capacity(x.len().div_ceil(n.max(1)));
    let mut i = 0;
    while i < x.len() {
        let end = (i + n).min(x.len());
        let block = x.slice(i, end).map_err(bb84_crypto::ShapeError::from)?;
        let block = if end - i < n {
            BitVec::new(&block.packed(), n)
        } else {
            block
        };
        out.push(secded(&block, h));
        i += n;
    }
    Ok(out)
}

/// The `h + 1`-bit Hamming SECDED syndrome of one `2^h`-bit block.
///
/// Parity bit `p` covers the positions whose 1-indexed number has bit `p`
/// set; the last bit is the block's total parity.
fn secded(block: &BitVec, h: u32) -> BitVec {
    debug_assert_eq!(block.len(), 1 << h);
    let mut syndrome = BitVec::empty();
    for p in 0..h {
        let stride = 1usize << p;
        let mut parity = false;
        let mut i = stride - 1;
        while i < block.len() {
            for j in i..(i + stride).min(block.len()) {
                parity ^= block.get(j);
            }
            i += 2 * stride;
        }
        syndrome.push(parity);
    }
    syndrome.push(block.parity());
    syndrome
}

/// Apply the announcer's syndrome differences to the fixer's vector.
///
/// The low `h` bits of each difference, read LSB-first, name the flipped
/// 1-indexed position. Zero means only the total parity flipped; the
/// original convention flips the block's last position in that case,
/// which privacy maintenance deletes right after, keeping the net effect
/// nil on the surviving subset. Flips addressed past the end of the
/// zero-padded final block are discarded.
fn apply_syndromes(x: &mut BitVec, sums: &[BitVec], todo: &BitVec, h: u32) {
    let n = 1usize << h;
    let mut k = 0;
    for block in 0..todo.len() {
        if !todo.get(block) {
            continue;
        }
        let syn = &sums[k];
        k += 1;
        let mut pos = 0usize;
        for j in 0..h as usize {
            if syn.get(j) {
                pos |= 1 << j;
            }
        }
        let pos = if pos == 0 { n - 1 } else { pos - 1 };
        let idx = block * n + pos;
        if idx < x.len() {
            x.flip(idx);
        }
    }
}

/// Delete every announced position: the `h` Hamming parity positions of
/// each corrected block, and the total-parity position of every block.
fn privacy_maintenance(x: &BitVec, todo: &BitVec, h: u32) -> BitVec {
    let n = 1usize << h;
    let mut keep = BitVec::empty();
    for block in 0..todo.len() {
        if todo.get(block) {
            for j in 0..n {
                keep.push((j + 1).count_ones() != 1);
            }
        } else {
            for _ in 0..n - 1 {
                keep.push(true);
            }
            keep.push(false);
        }
    }
    x.select(&keep)
}
