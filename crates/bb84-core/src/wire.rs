//! Classical side-channel messages and their binary form.
//!
//! Every payload is a tag byte followed by the message fields. All
//! multi-byte integers are little-endian. Bit arrays travel as a 4-byte
//! bit length plus `ceil(len / 8)` packed bytes whose trailing bits are
//! zero. Optional fields are gated by a flags byte so the encoding stays
//! deterministic and self-describing.

use bb84_bits::{bytes_for, BitVec};

use crate::error::ProtocolError;

const TAG_BASIS: u8 = 0x01;
const TAG_PARITY: u8 = 0x02;
const TAG_SYNDROMES: u8 = 0x03;
const TAG_EC_FINISHED: u8 = 0x04;

// BasisAnnouncement flags
const FLAG_DROPPED: u8 = 0b0000_0001;
const FLAG_INTENSITIES: u8 = 0b0000_0010;

// EcFinished flags
const FLAG_SEEDS: u8 = 0b0000_0001;

/// Basis reconciliation data for one measurement batch.
///
/// The receiver announces first, with `dropped` set; the sender answers
/// with `intensities` set. `test_bits` carries each side's measured
/// values on its own test-basis positions so both can tally errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasisAnnouncement {
    /// Basis choice per surviving pulse: 0 = main, 1 = test.
    pub bases: BitVec,
    /// Measured values masked to the announcer's test-basis positions.
    pub test_bits: BitVec,
    /// Pulses that never registered at the detector (receiver only).
    pub dropped: Option<BitVec>,
    /// One-hot decoy intensity masks (sender only).
    pub intensities: Option<IntensityMasks>,
}

/// One-hot decoy intensity membership per surviving pulse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityMasks {
    /// Low-intensity pulses.
    pub lo: BitVec,
    /// Medium-intensity pulses.
    pub med: BitVec,
    /// High-intensity pulses.
    pub hi: BitVec,
}

/// Per-block total parities for one Winnow iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParityAnnouncement {
    /// Bit `i` is the total parity of block `i`.
    pub parities: BitVec,
}

/// Full SECDED syndromes for the blocks whose total parities disagreed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyndromeAnnouncement {
    /// `h + 1`-bit syndromes in block order.
    pub syndromes: Vec<BitVec>,
}

/// Wrap-up of reconciliation: hash seeds and the correctness-check hash.
///
/// The announcer sends both seeds and its hash; the fixer answers with
/// its own hash only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcFinished {
    /// Toeplitz seed for privacy amplification (announcer only).
    pub extract_seed: Option<Vec<u8>>,
    /// Toeplitz seed for the correctness check (announcer only).
    pub verify_seed: Option<Vec<u8>>,
    /// Correctness-check hash of the announcer's or fixer's key material.
    pub verify_hash: BitVec,
}

/// One classical side-channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Basis reconciliation for one batch.
    Basis(BasisAnnouncement),
    /// Winnow total parities.
    Parity(ParityAnnouncement),
    /// Winnow syndromes.
    Syndromes(SyndromeAnnouncement),
    /// Reconciliation wrap-up.
    EcFinished(EcFinished),
}

impl Message {
    /// Human-readable message kind, for protocol-mismatch errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Basis(_) => "basis announcement",
            Message::Parity(_) => "parity announcement",
            Message::Syndromes(_) => "syndrome announcement",
            Message::EcFinished(_) => "error-correction finished",
        }
    }

    /// Serialize to the canonical payload bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Message::Basis(m) => {
                buf.push(TAG_BASIS);
                let mut flags = 0u8;
                if m.dropped.is_some() {
                    flags |= FLAG_DROPPED;
                }
                if m.intensities.is_some() {
                    flags |= FLAG_INTENSITIES;
                }
                buf.push(flags);
                put_bits(&mut buf, &m.bases);
                put_bits(&mut buf, &m.test_bits);
                if let Some(d) = &m.dropped {
                    put_bits(&mut buf, d);
                }
                if let Some(i) = &m.intensities {
                    put_bits(&mut buf, &i.lo);
                    put_bits(&mut buf, &i.med);
                    put_bits(&mut buf, &i.hi);
                }
            }
            Message::Parity(m) => {
                buf.push(TAG_PARITY);
                put_bits(&mut buf, &m.parities);
            }
            Message::Syndromes(m) => {
                buf.push(TAG_SYNDROMES);
                buf.extend_from_slice(&(m.syndromes.len() as u32).to_le_bytes());
                for s in &m.syndromes {
                    put_bits(&mut buf, s);
                }
            }
            Message::EcFinished(m) => {
                buf.push(TAG_EC_FINISHED);
                let has_seeds = m.extract_seed.is_some() && m.verify_seed.is_some();
                buf.push(if has_seeds { FLAG_SEEDS } else { 0 });
                if has_seeds {
                    put_bytes(&mut buf, m.extract_seed.as_deref().unwrap_or_default());
                    put_bytes(&mut buf, m.verify_seed.as_deref().unwrap_or_default());
                }
                put_bits(&mut buf, &m.verify_hash);
            }
        }
        buf
    }

    /// Parse a payload produced by [`encode`](Message::encode).
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] naming the defect: unknown tag,
    /// truncation inside a field, or trailing garbage.
    pub fn decode(payload: &[u8]) -> Result<Message, ProtocolError> {
        let mut r = Reader::new(payload);
        let msg = match r.u8("tag")? {
            TAG_BASIS => {
                let flags = r.u8("flags")?;
                let bases = r.bits("bases")?;
                let test_bits = r.bits("test_bits")?;
                let dropped = if flags & FLAG_DROPPED != 0 {
                    Some(r.bits("dropped")?)
                } else {
                    None
                };
                let intensities = if flags & FLAG_INTENSITIES != 0 {
                    Some(IntensityMasks {
                        lo: r.bits("lo")?,
                        med: r.bits("med")?,
                        hi: r.bits("hi")?,
                    })
                } else {
                    None
                };
                Message::Basis(BasisAnnouncement {
                    bases,
                    test_bits,
                    dropped,
                    intensities,
                })
            }
            TAG_PARITY => Message::Parity(ParityAnnouncement {
                parities: r.bits("parities")?,
            }),
            TAG_SYNDROMES => {
                let count = r.u32("syndrome count")? as usize;
                let mut syndromes = Vec::with_capacity(count.min(payload.len()));
                for _ in 0..count {
                    syndromes.push(r.bits("syndrome")?);
                }
                Message::Syndromes(SyndromeAnnouncement { syndromes })
            }
            TAG_EC_FINISHED => {
                let flags = r.u8("flags")?;
                let (extract_seed, verify_seed) = if flags & FLAG_SEEDS != 0 {
                    (
                        Some(r.bytes("extract_seed")?),
                        Some(r.bytes("verify_seed")?),
                    )
                } else {
                    (None, None)
                };
                Message::EcFinished(EcFinished {
                    extract_seed,
                    verify_seed,
                    verify_hash: r.bits("verify_hash")?,
                })
            }
            tag => return Err(ProtocolError::UnknownTag(tag)),
        };
        r.finish()?;
        Ok(msg)
    }

    /// Unwrap a basis announcement.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnexpectedMessage`] for any other kind.
    pub fn into_basis(self) -> Result<BasisAnnouncement, ProtocolError> {
        match self {
            Message::Basis(m) => Ok(m),
            other => Err(ProtocolError::UnexpectedMessage {
                expected: "basis announcement",
                got: other.kind(),
            }),
        }
    }

    /// Unwrap a parity announcement.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnexpectedMessage`] for any other kind.
    pub fn into_parity(self) -> Result<ParityAnnouncement, ProtocolError> {
        match self {
            Message::Parity(m) => Ok(m),
            other => Err(ProtocolError::UnexpectedMessage {
                expected: "parity announcement",
                got: other.kind(),
            }),
        }
    }

    /// Unwrap a syndrome announcement.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnexpectedMessage`] for any other kind.
    pub fn into_syndromes(self) -> Result<SyndromeAnnouncement, ProtocolError> {
        match self {
            Message::Syndromes(m) => Ok(m),
            other => Err(ProtocolError::UnexpectedMessage {
                expected: "syndrome announcement",
                got: other.kind(),
            }),
        }
    }

    /// Unwrap an error-correction-finished message.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnexpectedMessage`] for any other kind.
    pub fn into_ec_finished(self) -> Result<EcFinished, ProtocolError> {
        match self {
            Message::EcFinished(m) => Ok(m),
            other => Err(ProtocolError::UnexpectedMessage {
                expected: "error-correction finished",
                got: other.kind(),
            }),
        }
    }
}

fn put_bits(buf: &mut Vec<u8>, v: &BitVec) {
    buf.extend_from_slice(&v.to_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, b: &[u8]) {
    buf.extend_from_slice(&(b.len() as u32).to_le_bytes());
    buf.extend_from_slice(b);
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], ProtocolError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.buf.len())
            .ok_or(ProtocolError::Truncated(field))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, ProtocolError> {
        Ok(self.take(1, field)?[0])
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, ProtocolError> {
        let b = self.take(4, field)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn bits(&mut self, field: &'static str) -> Result<BitVec, ProtocolError> {
        let len = self.u32(field)? as usize;
        let body = self.take(bytes_for(len), field)?;
        Ok(BitVec::new(body, len))
    }

    fn bytes(&mut self, field: &'static str) -> Result<Vec<u8>, ProtocolError> {
        let len = self.u32(field)? as usize;
        Ok(self.take(len, field)?.to_vec())
    }

    fn finish(self) -> Result<(), ProtocolError> {
        if self.pos != self.buf.len() {
            return Err(ProtocolError::TrailingBytes(self.buf.len() - self.pos));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bv(s: &str) -> BitVec {
        s.parse().expect("test literal")
    }

    fn roundtrip(msg: Message) {
        let encoded = msg.encode();
        assert_eq!(Message::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn test_basis_roundtrip_receiver_shape() {
        roundtrip(Message::Basis(BasisAnnouncement {
            bases: bv("0110 1101 01"),
            test_bits: bv("0010 0100 01"),
            dropped: Some(bv("1000 0010 00")),
            intensities: None,
        }));
    }

    #[test]
    fn test_basis_roundtrip_sender_shape() {
        roundtrip(Message::Basis(BasisAnnouncement {
            bases: bv("0110"),
            test_bits: bv("0010"),
            dropped: None,
            intensities: Some(IntensityMasks {
                lo: bv("1000"),
                med: bv("0110"),
                hi: bv("0001"),
            }),
        }));
    }

    #[test]
    fn test_parity_roundtrip() {
        roundtrip(Message::Parity(ParityAnnouncement {
            parities: bv("1011 0"),
        }));
    }

    #[test]
    fn test_syndromes_roundtrip() {
        roundtrip(Message::Syndromes(SyndromeAnnouncement {
            syndromes: vec![bv("1001"), bv("0000"), bv("1111")],
        }));
        roundtrip(Message::Syndromes(SyndromeAnnouncement {
            syndromes: vec![],
        }));
    }

    #[test]
    fn test_ec_finished_roundtrip() {
        roundtrip(Message::EcFinished(EcFinished {
            extract_seed: Some(vec![1, 2, 3, 4, 5]),
            verify_seed: Some(vec![9, 8, 7]),
            verify_hash: bv("1100 1010"),
        }));
        roundtrip(Message::EcFinished(EcFinished {
            extract_seed: None,
            verify_seed: None,
            verify_hash: bv("1100 1010"),
        }));
    }

    #[test]
    fn test_empty_bit_arrays() {
        roundtrip(Message::Parity(ParityAnnouncement {
            parities: BitVec::empty(),
        }));
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(
            Message::decode(&[0x7F]),
            Err(ProtocolError::UnknownTag(0x7F))
        );
    }

    #[test]
    fn test_truncated_field() {
        let mut buf = Message::Parity(ParityAnnouncement {
            parities: bv("1011 0110"),
        })
        .encode();
        buf.pop();
        assert_eq!(
            Message::decode(&buf),
            Err(ProtocolError::Truncated("parities"))
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut buf = Message::Parity(ParityAnnouncement {
            parities: bv("1011"),
        })
        .encode();
        buf.push(0);
        assert_eq!(Message::decode(&buf), Err(ProtocolError::TrailingBytes(1)));
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(Message::decode(&[]), Err(ProtocolError::Truncated("tag")));
    }

    #[test]
    fn test_into_helpers_name_kinds() {
        let m = Message::Parity(ParityAnnouncement { parities: bv("1") });
        assert_eq!(
            m.into_basis(),
            Err(ProtocolError::UnexpectedMessage {
                expected: "basis announcement",
                got: "parity announcement",
            })
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_decode_doesnt_panic(data in prop::collection::vec(any::<u8>(), 0..512)) {
                let _ = Message::decode(&data);
            }

            #[test]
            fn prop_parity_roundtrip(bytes in prop::collection::vec(any::<u8>(), 0..64), len in 0usize..512) {
                let v = BitVec::new(&bytes, len);
                let msg = Message::Parity(ParityAnnouncement { parities: v });
                prop_assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);
            }
        }
    }
}
