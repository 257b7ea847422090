//! Bitwise operations over pairs of vectors.
//!
//! Operands of different lengths are allowed: the shorter one extends with
//! its fill value. The result's length is the shortest prefix past which
//! the output is constant, and its fill is the operator applied to the two
//! input fills.

use crate::bytes_for;
use crate::dense::BitVec;

impl BitVec {
    /// Bitwise AND.
    ///
    /// The result is as long as the shorter operand, unless the shorter
    /// operand fills with 1 (its extension then passes the longer operand
    /// through).
    #[must_use]
    pub fn and(&self, other: &BitVec) -> BitVec {
        let (short, long) = ordered(self, other);
        let rlen = if short.fill() { long.len() } else { short.len() };
        combine(self, other, rlen, self.fill() && other.fill(), |a, b| a & b)
    }

    /// Bitwise OR.
    ///
    /// The result is as long as the longer operand, unless the shorter
    /// operand fills with 1 (the extension then saturates the tail).
    #[must_use]
    pub fn or(&self, other: &BitVec) -> BitVec {
        let (short, long) = ordered(self, other);
        let rlen = if short.fill() { short.len() } else { long.len() };
        combine(self, other, rlen, self.fill() || other.fill(), |a, b| a | b)
    }

    /// Bitwise XOR; the result is as long as the longer operand.
    #[must_use]
    pub fn xor(&self, other: &BitVec) -> BitVec {
        let rlen = self.len().max(other.len());
        combine(self, other, rlen, self.fill() != other.fill(), |a, b| a ^ b)
    }

    /// Bitwise XNOR; the result is as long as the longer operand.
    #[must_use]
    pub fn xnor(&self, other: &BitVec) -> BitVec {
        let rlen = self.len().max(other.len());
        combine(self, other, rlen, self.fill() == other.fill(), |a, b| !(a ^ b))
    }

    /// Bitwise complement. Length is unchanged; the fill flips, so the
    /// result stays correct under later mixed-length operations.
    #[must_use]
    pub fn not(&self) -> BitVec {
        let bytes = (0..bytes_for(self.len())).map(|i| !self.byte(i)).collect();
        BitVec::from_parts(bytes, self.len(), !self.fill())
    }
}

fn ordered<'a>(a: &'a BitVec, b: &'a BitVec) -> (&'a BitVec, &'a BitVec) {
    if a.len() <= b.len() {
        (a, b)
    } else {
        (b, a)
    }
}

fn combine(a: &BitVec, b: &BitVec, rlen: usize, rfill: bool, f: impl Fn(u8, u8) -> u8) -> BitVec {
    let bytes = (0..bytes_for(rlen))
        .map(|i| f(a.byte_ext(i), b.byte_ext(i)))
        .collect();
    BitVec::from_parts(bytes, rlen, rfill)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bv(s: &str) -> BitVec {
        s.parse().expect("test literal")
    }

    #[test]
    fn test_and_same_length() {
        assert_eq!(bv("1100 1").and(&bv("1010 1")), bv("1000 1"));
    }

    #[test]
    fn test_and_mixed_length_zero_fill() {
        // zero-fill extension truncates to the shorter operand
        assert_eq!(bv("1111 1111").and(&bv("101")), bv("101"));
    }

    #[test]
    fn test_and_with_negated_short() {
        // NOT(01) = 10 with fill 1: passes the longer operand through
        let mask = bv("01").not();
        assert_eq!(bv("1101 01").and(&mask), bv("1001 01"));
    }

    #[test]
    fn test_or_mixed_length() {
        assert_eq!(bv("1000").or(&bv("0110 11")), bv("1110 11"));
        // negated short operand saturates the tail, so the tail is constant
        let m = bv("10").not();
        assert_eq!(bv("1000 11").or(&m), bv("11"));
    }

    #[test]
    fn test_xor_extends_short_with_zero() {
        assert_eq!(bv("1101").xor(&bv("01")), bv("1001"));
    }

    #[test]
    fn test_xor_extends_negated_short_with_ones() {
        let n = bv("10").not(); // 01, fill 1
        assert_eq!(bv("1101 0").xor(&n), bv("1010 1"));
    }

    #[test]
    fn test_xnor_is_negated_xor() {
        let (a, b) = (bv("1100 110"), bv("1010 1"));
        assert_eq!(a.xnor(&b), a.xor(&b).not());
    }

    #[test]
    fn test_not_roundtrip_keeps_fill() {
        let v = bv("0110 101");
        let n = v.not();
        assert!(n.fill());
        assert_eq!(n.not(), v);
    }

    #[test]
    fn test_and_with_own_complement_is_zero() {
        let v = bv("0110 1011 001");
        assert_eq!(v.and(&v.not()).count_ones(), 0);
    }

    #[test]
    fn test_dot() {
        assert!(bv("110").dot(&bv("101")));
        assert!(!bv("111").dot(&bv("110")));
        assert!(!BitVec::empty().dot(&bv("1")));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_pair(max_bits: usize) -> impl Strategy<Value = (BitVec, BitVec)> {
            let one = (prop::collection::vec(any::<u8>(), 0..=max_bits / 8), 0..=max_bits)
                .prop_map(|(bytes, len)| BitVec::new(&bytes, len));
            let other = one.clone();
            (one, other)
        }

        proptest! {
            #[test]
            fn prop_double_negation((v, _) in arb_pair(200)) {
                prop_assert_eq!(v.not().not(), v);
            }

            #[test]
            fn prop_xor_involution((a, b) in arb_pair(200)) {
                // cancellation holds whenever the length does not grow
                prop_assume!(b.len() <= a.len());
                prop_assert_eq!(a.xor(&b).xor(&b), a);
            }

            #[test]
            fn prop_and_complement_empty((v, _) in arb_pair(200)) {
                prop_assert_eq!(v.and(&v.not()).count_ones(), 0);
            }

            #[test]
            fn prop_ops_match_bitwise_get((a, b) in arb_pair(200)) {
                let (and, or, xor) = (a.and(&b), a.or(&b), a.xor(&b));
                for i in 0..and.len() {
                    prop_assert_eq!(and.get(i), a.get(i) && b.get(i));
                }
                for i in 0..or.len() {
                    prop_assert_eq!(or.get(i), a.get(i) || b.get(i));
                }
                for i in 0..xor.len() {
                    prop_assert_eq!(xor.get(i), a.get(i) != b.get(i));
                }
            }
        }
    }
}
