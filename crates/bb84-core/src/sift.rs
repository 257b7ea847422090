//! Basis sifting and decoy-state bookkeeping.

use bb84_bits::BitVec;

/// Measurements surviving a sift, partitioned by decoy intensity.
///
/// `all` holds every surviving bit; `lo`/`med`/`hi` hold the subsets sent
/// at each intensity. For the error tally produced by [`sift`], `all`
/// stays empty and the intensity members hold per-position disagreement
/// bits instead of measurements.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SiftGroup {
    /// All surviving bits, in pulse order.
    pub all: BitVec,
    /// Bits from low-intensity pulses.
    pub lo: BitVec,
    /// Bits from medium-intensity pulses.
    pub med: BitVec,
    /// Bits from high-intensity pulses.
    pub hi: BitVec,
}

impl SiftGroup {
    /// Append another group's contents, per member.
    pub fn append(&mut self, other: &SiftGroup) {
        self.all.append(&other.all);
        self.lo.append(&other.lo);
        self.med.append(&other.med);
        self.hi.append(&other.hi);
    }

    /// Surviving pulses per intensity, summed.
    #[must_use]
    pub fn intensity_total(&self) -> usize {
        self.lo.len() + self.med.len() + self.hi.len()
    }
}

/// Partition one batch of measurements by basis agreement.
///
/// All inputs are parallel vectors over the batch's surviving pulses:
/// `bits` and `bases` are this peer's, `other_test` and `other_bases` the
/// peer's announced ones, `lo`/`med`/`hi` the sender's intensity masks.
///
/// Returns `(main, test, errors)`: positions where both chose the main
/// basis, positions where both chose the test basis, and the per-position
/// disagreements over the test subsets. Both peers compute identical
/// group sizes and identical error vectors, which is what lets them run
/// parameter estimation without further exchange.
#[must_use]
pub fn sift(
    bits: &BitVec,
    other_test: &BitVec,
    bases: &BitVec,
    other_bases: &BitVec,
    lo: &BitVec,
    med: &BitVec,
    hi: &BitVec,
) -> (SiftGroup, SiftGroup, SiftGroup) {
    let main_mask = bases.not().and(&other_bases.not());
    let test_mask = bases.and(other_bases);

    let main = SiftGroup {
        all: bits.select(&main_mask),
        lo: bits.select(&main_mask.and(lo)),
        med: bits.select(&main_mask.and(med)),
        hi: bits.select(&main_mask.and(hi)),
    };
    let test = SiftGroup {
        all: bits.select(&test_mask),
        lo: bits.select(&test_mask.and(lo)),
        med: bits.select(&test_mask.and(med)),
        hi: bits.select(&test_mask.and(hi)),
    };
    let other = SiftGroup {
        all: BitVec::empty(),
        lo: other_test.select(&test_mask.and(lo)),
        med: other_test.select(&test_mask.and(med)),
        hi: other_test.select(&test_mask.and(hi)),
    };
    let errors = SiftGroup {
        all: BitVec::empty(),
        lo: test.lo.xor(&other.lo),
        med: test.med.xor(&other.med),
        hi: test.hi.xor(&other.hi),
    };
    (main, test, errors)
}
