//! The dense bit-vector container.

use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::bytes_for;
use crate::error::BitsError;

/// A densely-packed sequence of bits.
///
/// The vector has a length in bits (not necessarily byte-aligned) and an
/// implicit-fill flag: every bit at an index at or beyond the length reads
/// as the fill value. Freshly built vectors fill with 0; [`not`] flips the
/// fill, so the complement of a bounded vector still combines correctly
/// with longer operands.
///
/// Reads go through a canonical byte accessor that hides the slice offset
/// and masks storage past the length, so garbage bits in the backing
/// buffer are never observable. Equality compares exactly the first
/// `len()` bits.
///
/// [`not`]: BitVec::not
#[derive(Clone, Default)]
pub struct BitVec {
    bytes: Vec<u8>,
    len: usize,
    // Bits to skip at the front of `bytes`; always < 8. Produced by
    // `slice`, which shares the covering byte range instead of re-packing.
    offset: usize,
    fill: bool,
}

impl BitVec {
    /// An empty vector (length 0, fill 0).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    // Assembly from canonical (zero-offset) parts; ops-internal.
    pub(crate) fn from_parts(bytes: Vec<u8>, len: usize, fill: bool) -> Self {
        debug_assert!(bytes.len() >= bytes_for(len));
        Self {
            bytes,
            len,
            offset: 0,
            fill,
        }
    }

    /// A vector of `bits` zero bits.
    #[must_use]
    pub fn zeros(bits: usize) -> Self {
        Self {
            bytes: vec![0; bytes_for(bits)],
            len: bits,
            offset: 0,
            fill: false,
        }
    }

    /// Copy-construct from packed bytes with an explicit bit length.
    ///
    /// If `bit_len` exceeds `8 * data.len()`, the extra bits are zero.
    #[must_use]
    pub fn new(data: &[u8], bit_len: usize) -> Self {
        let mut bytes = data.to_vec();
        if bytes.len() < bytes_for(bit_len) {
            bytes.resize(bytes_for(bit_len), 0);
        }
        Self {
            bytes,
            len: bit_len,
            offset: 0,
            fill: false,
        }
    }

    /// Copy-construct from packed bytes, inferring the length as
    /// `8 * data.len()`.
    #[must_use]
    pub fn from_packed(data: &[u8]) -> Self {
        Self::new(data, data.len() * 8)
    }

    /// Length in bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vector holds zero bits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of bytes the packed form occupies.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        bytes_for(self.len)
    }

    /// The implicit value of every bit at index `>= len()`.
    #[must_use]
    pub fn fill(&self) -> bool {
        self.fill
    }

    #[inline]
    fn fill_byte(&self) -> u8 {
        if self.fill { 0xFF } else { 0x00 }
    }

    /// Canonical `i`-th byte: offset removed, positions past `len` masked
    /// to the fill value.
    #[inline]
    pub(crate) fn byte(&self, i: usize) -> u8 {
        let lo = self.raw(i) >> self.offset;
        let b = if self.offset == 0 {
            lo
        } else {
            lo | (self.raw(i + 1) << (8 - self.offset))
        };
        let live = self.len.saturating_sub(i * 8);
        if live >= 8 {
            b
        } else if live == 0 {
            self.fill_byte()
        } else {
            let mask = 0xFFu8 >> (8 - live);
            (b & mask) | (self.fill_byte() & !mask)
        }
    }

    /// Canonical byte for any index, extending past the storage with the
    /// fill value. This is what mixed-length bitwise ops read.
    #[inline]
    pub(crate) fn byte_ext(&self, i: usize) -> u8 {
        if i < bytes_for(self.len) {
            self.byte(i)
        } else {
            self.fill_byte()
        }
    }

    #[inline]
    fn raw(&self, i: usize) -> u8 {
        self.bytes.get(i).copied().unwrap_or_else(|| self.fill_byte())
    }

    /// The bit at index `i`; indexes at or past `len()` read the fill.
    #[must_use]
    pub fn get(&self, i: usize) -> bool {
        if i >= self.len {
            return self.fill;
        }
        let pos = self.offset + i;
        self.raw(pos / 8) & (1 << (pos % 8)) != 0
    }

    /// Set the bit at index `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= len()`.
    pub fn set(&mut self, i: usize, bit: bool) {
        assert!(i < self.len, "bit index {i} out of range for {} bits", self.len);
        let pos = self.offset + i;
        if bit {
            self.bytes[pos / 8] |= 1 << (pos % 8);
        } else {
            self.bytes[pos / 8] &= !(1 << (pos % 8));
        }
    }

    /// Invert the bit at index `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= len()`.
    pub fn flip(&mut self, i: usize) {
        assert!(i < self.len, "bit index {i} out of range for {} bits", self.len);
        let pos = self.offset + i;
        self.bytes[pos / 8] ^= 1 << (pos % 8);
    }

    /// Append a single bit.
    pub fn push(&mut self, bit: bool) {
        let pos = self.offset + self.len;
        while self.bytes.len() <= pos / 8 {
            self.bytes.push(self.fill_byte());
        }
        if bit {
            self.bytes[pos / 8] |= 1 << (pos % 8);
        } else {
            self.bytes[pos / 8] &= !(1 << (pos % 8));
        }
        self.len += 1;
    }

    /// Append the contents of `other`.
    ///
    /// The destination keeps its own fill; trailing positions past the new
    /// length still read as the destination's fill value.
    pub fn append(&mut self, other: &BitVec) {
        if (self.offset + self.len) % 8 == 0 {
            // Byte-aligned fast path: drop stored garbage past the end and
            // splice the canonical bytes of `other` in directly.
            self.bytes.truncate((self.offset + self.len) / 8);
            for i in 0..other.byte_len() {
                self.bytes.push(other.byte(i));
            }
            self.len += other.len;
            return;
        }
        for j in 0..other.len {
            self.push(other.get(j));
        }
    }

    // The canonical byte with positions past `bits` zeroed, regardless of
    // the fill value. Counting and parity must not see fill-1 tails.
    #[inline]
    fn zeroed_byte(&self, i: usize, bits: usize) -> u8 {
        let b = self.byte(i);
        let live = bits - i * 8;
        if live < 8 {
            b & (0xFF >> (8 - live))
        } else {
            b
        }
    }

    /// Bits set among the first `len()` bits.
    #[must_use]
    pub fn count_ones(&self) -> usize {
        (0..self.byte_len())
            .map(|i| self.zeroed_byte(i, self.len).count_ones() as usize)
            .sum()
    }

    /// Overall parity of the first `len()` bits; `true` means odd.
    #[must_use]
    pub fn parity(&self) -> bool {
        let mut acc = 0u8;
        for i in 0..self.byte_len() {
            acc ^= self.zeroed_byte(i, self.len);
        }
        acc.count_ones() % 2 == 1
    }

    /// GF(2) inner product with `other`, over the common prefix of the two
    /// vectors: `parity(self AND other)`.
    #[must_use]
    pub fn dot(&self, other: &BitVec) -> bool {
        let n = self.len.min(other.len);
        let mut acc = 0u8;
        for i in 0..bytes_for(n) {
            acc ^= self.zeroed_byte(i, n) & other.zeroed_byte(i, n);
        }
        acc.count_ones() % 2 == 1
    }

    /// The subsequence of `self` at the positions where `mask` is set,
    /// order preserved. Positions at or past either length are not
    /// visited.
    #[must_use]
    pub fn select(&self, mask: &BitVec) -> BitVec {
        let mut out = BitVec::empty();
        let n = self.len.min(mask.len);
        for i in 0..n {
            if mask.get(i) {
                out.push(self.get(i));
            }
        }
        out
    }

    /// Copy of bits `[start, end)`.
    ///
    /// The copy shares no storage with `self`, but keeps a bit offset into
    /// its covering byte range rather than re-packing.
    ///
    /// # Errors
    ///
    /// Returns [`BitsError::SliceRange`] if `start > end` or
    /// `end > len()`.
    pub fn slice(&self, start: usize, end: usize) -> Result<BitVec, BitsError> {
        if start > end || end > self.len {
            return Err(BitsError::SliceRange {
                start,
                end,
                len: self.len,
            });
        }
        let pos = self.offset + start;
        let first = pos / 8;
        let last = bytes_for(self.offset + end).min(self.bytes.len());
        Ok(BitVec {
            bytes: self.bytes[first.min(last)..last].to_vec(),
            len: end - start,
            offset: pos % 8,
            fill: self.fill,
        })
    }

    /// Permute the bits in place with a Fisher-Yates shuffle driven by
    /// `rng`.
    ///
    /// Two vectors of equal length shuffled by RNGs in identical states
    /// end up under the same permutation; reconciliation relies on this.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for i in (1..self.len).rev() {
            let j = rng.random_range(0..=i);
            let (a, b) = (self.get(i), self.get(j));
            if a != b {
                self.flip(i);
                self.flip(j);
            }
        }
    }

    /// Packed bytes of the first `len()` bits; trailing bits of the final
    /// byte are zero regardless of the fill value.
    #[must_use]
    pub fn packed(&self) -> Vec<u8> {
        let nb = self.byte_len();
        let mut v: Vec<u8> = (0..nb).map(|i| self.byte(i)).collect();
        if self.len % 8 != 0 {
            v[nb - 1] &= 0xFF >> (8 - self.len % 8);
        }
        v
    }

    /// Canonical serialization: `u32` little-endian bit length, then the
    /// packed bytes. The fill flag is not serialized; deserialized vectors
    /// fill with 0.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.byte_len());
        out.extend_from_slice(&(self.len as u32).to_le_bytes());
        out.extend_from_slice(&self.packed());
        out
    }

    /// Parse the canonical serialization produced by [`to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`BitsError::MissingHeader`] or [`BitsError::Truncated`] if
    /// `buf` is too short.
    ///
    /// [`to_bytes`]: BitVec::to_bytes
    pub fn from_bytes(buf: &[u8]) -> Result<BitVec, BitsError> {
        let header: [u8; 4] = buf
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or(BitsError::MissingHeader)?;
        let len = u32::from_le_bytes(header) as usize;
        let body = &buf[4..];
        if body.len() < bytes_for(len) {
            return Err(BitsError::Truncated {
                expect: bytes_for(len),
                have: body.len(),
            });
        }
        Ok(BitVec::new(&body[..bytes_for(len)], len))
    }
}

impl PartialEq for BitVec {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        let full = self.len / 8;
        for i in 0..full {
            if self.byte(i) != other.byte(i) {
                return false;
            }
        }
        if self.len % 8 != 0 {
            let mask = 0xFFu8 >> (8 - self.len % 8);
            return self.byte(full) & mask == other.byte(full) & mask;
        }
        true
    }
}

impl Eq for BitVec {}

impl fmt::Display for BitVec {
    /// Renders bit 0 first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len {
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const SHOWN: usize = 96;
        write!(f, "BitVec[{}; ", self.len)?;
        for i in 0..self.len.min(SHOWN) {
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        if self.len > SHOWN {
            f.write_str("..")?;
        }
        f.write_str("]")
    }
}

impl FromStr for BitVec {
    type Err = BitsError;

    /// Parse a string of `'0'`/`'1'` characters, bit 0 first; spaces are
    /// ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut v = BitVec::empty();
        for c in s.chars() {
            match c {
                '0' => v.push(false),
                '1' => v.push(true),
                ' ' => {}
                other => return Err(BitsError::BadChar(other)),
            }
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bv(s: &str) -> BitVec {
        s.parse().expect("test literal")
    }

    #[test]
    fn test_new_pads_short_data() {
        let v = BitVec::new(&[0xFF], 12);
        assert_eq!(v.len(), 12);
        assert!(v.get(7));
        assert!(!v.get(8));
        assert!(!v.get(11));
    }

    #[test]
    fn test_get_past_len_reads_fill() {
        let v = BitVec::new(&[0b0000_0101], 3);
        assert!(!v.get(3));
        assert!(!v.get(100));
        let n = v.not();
        assert!(n.get(3));
        assert!(n.get(100));
    }

    #[test]
    fn test_push_and_get() {
        let mut v = BitVec::empty();
        for i in 0..20 {
            v.push(i % 3 == 0);
        }
        assert_eq!(v.len(), 20);
        for i in 0..20 {
            assert_eq!(v.get(i), i % 3 == 0, "bit {i}");
        }
    }

    #[test]
    fn test_set_flip() {
        let mut v = BitVec::zeros(10);
        v.set(4, true);
        assert!(v.get(4));
        v.flip(4);
        assert!(!v.get(4));
        v.flip(9);
        assert_eq!(v.count_ones(), 1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_set_out_of_range_panics() {
        let mut v = BitVec::zeros(4);
        v.set(4, true);
    }

    #[test]
    fn test_append_aligned_and_unaligned() {
        let mut a = bv("10110");
        a.append(&bv("001"));
        assert_eq!(a, bv("10110001"));
        // now byte-aligned; append across the boundary
        a.append(&bv("111 0101"));
        assert_eq!(a, bv("10110001 1110101"));
        assert_eq!(a.len(), 15);
    }

    #[test]
    fn test_append_into_negated() {
        let mut a = bv("101").not(); // 010, fill = 1
        a.append(&bv("0011"));
        assert_eq!(a, bv("010 0011"));
        // fill is preserved on the destination
        assert!(a.get(7));
        assert!(a.fill());
    }

    #[test]
    fn test_count_parity() {
        let v = bv("1011 0111 01");
        assert_eq!(v.count_ones(), 7);
        assert!(v.parity());
        let w = bv("11");
        assert!(!w.parity());
    }

    #[test]
    fn test_select_preserves_order() {
        let data = bv("10110010");
        let mask = bv("11010001");
        assert_eq!(data.select(&mask), bv("1010"));
    }

    #[test]
    fn test_select_stops_at_shorter_mask() {
        let data = bv("11111111");
        let mask = bv("101");
        assert_eq!(data.select(&mask), bv("11"));
    }

    #[test]
    fn test_slice_honors_offset() {
        let v = bv("0110 1101 0011");
        let s = v.slice(3, 9).unwrap();
        assert_eq!(s, bv("011010"));
        assert_eq!(s.len(), 6);
        // reads through the offset on every op
        assert_eq!(s.count_ones(), 3);
        assert_eq!(s.packed(), vec![0b0001_0110]);
    }

    #[test]
    fn test_slice_of_slice() {
        let v = bv("0110 1101 0011");
        let s = v.slice(2, 11).unwrap().slice(1, 7).unwrap();
        assert_eq!(s, v.slice(3, 9).unwrap());
    }

    #[test]
    fn test_slice_bounds() {
        let v = bv("0101");
        assert_eq!(
            v.slice(2, 5),
            Err(BitsError::SliceRange { start: 2, end: 5, len: 4 })
        );
        assert_eq!(
            v.slice(3, 2),
            Err(BitsError::SliceRange { start: 3, end: 2, len: 4 })
        );
        assert_eq!(v.slice(4, 4).unwrap(), BitVec::empty());
    }

    #[test]
    fn test_mutation_through_slice_offset() {
        let v = bv("00000000 1111");
        let mut s = v.slice(6, 12).unwrap();
        s.flip(0);
        assert_eq!(s, bv("101111"));
    }

    #[test]
    fn test_shuffle_is_a_permutation_and_synchronized() {
        use rand::SeedableRng;
        use rand_chacha::ChaCha8Rng;

        let mut a = bv("1101 0010 1110 0100 1");
        let mut b = a.clone();
        let ones = a.count_ones();
        a.shuffle(&mut ChaCha8Rng::seed_from_u64(17));
        b.shuffle(&mut ChaCha8Rng::seed_from_u64(17));
        assert_eq!(a, b);
        assert_eq!(a.count_ones(), ones);

        let mut c = bv("1101 0010 1110 0100 1");
        c.shuffle(&mut ChaCha8Rng::seed_from_u64(18));
        // Overwhelmingly likely to differ from the seed-17 permutation.
        assert_ne!(a, c);
    }

    #[test]
    fn test_packed_masks_tail() {
        let v = BitVec::new(&[0xFF, 0xFF], 11).not().not();
        assert_eq!(v.packed(), vec![0xFF, 0b0000_0111]);
    }

    #[test]
    fn test_roundtrip() {
        for s in ["", "1", "0110", "1011 0010 1", "1111 1111 1111 1111"] {
            let v = bv(s);
            assert_eq!(BitVec::from_bytes(&v.to_bytes()).unwrap(), v);
        }
        // fill is dropped on the wire, but the first len bits survive
        let n = bv("0110").not();
        assert_eq!(BitVec::from_bytes(&n.to_bytes()).unwrap(), bv("1001"));
    }

    #[test]
    fn test_from_bytes_truncated() {
        assert_eq!(BitVec::from_bytes(&[1, 0]), Err(BitsError::MissingHeader));
        let mut buf = bv("1111 1111 1").to_bytes();
        buf.pop();
        assert_eq!(
            BitVec::from_bytes(&buf),
            Err(BitsError::Truncated { expect: 2, have: 1 })
        );
    }

    #[test]
    fn test_from_str_rejects_junk() {
        assert_eq!("01x1".parse::<BitVec>(), Err(BitsError::BadChar('x')));
    }

    #[test]
    fn test_display() {
        assert_eq!(bv("0101 1").to_string(), "01011");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_bitvec(max_bits: usize) -> impl Strategy<Value = BitVec> {
            (prop::collection::vec(any::<u8>(), 0..=max_bits / 8 + 1), 0..=max_bits).prop_map(
                |(bytes, len)| BitVec::new(&bytes, len),
            )
        }

        proptest! {
            #[test]
            fn prop_serialization_roundtrip(v in arb_bitvec(256)) {
                let back = BitVec::from_bytes(&v.to_bytes()).unwrap();
                prop_assert_eq!(back, v);
            }

            #[test]
            fn prop_select_by_ones_is_identity(v in arb_bitvec(256)) {
                let mask = v.xnor(&v); // all ones, same length
                prop_assert_eq!(v.select(&mask), v);
            }

            #[test]
            fn prop_slice_matches_get(v in arb_bitvec(256), a in 0usize..256, b in 0usize..256) {
                let (a, b) = (a.min(v.len()), b.min(v.len()));
                let (a, b) = (a.min(b), a.max(b));
                let s = v.slice(a, b).unwrap();
                prop_assert_eq!(s.len(), b - a);
                for i in 0..s.len() {
                    prop_assert_eq!(s.get(i), v.get(a + i));
                }
            }

            #[test]
            fn prop_count_ones_matches_get(v in arb_bitvec(256)) {
                let slow = (0..v.len()).filter(|&i| v.get(i)).count();
                prop_assert_eq!(v.count_ones(), slow);
                prop_assert_eq!(v.parity(), slow % 2 == 1);
            }
        }
    }
}
