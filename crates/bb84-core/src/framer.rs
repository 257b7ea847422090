//! The authenticated message framer.
//!
//! Wire format per frame:
//!
//! ```text
//! | len: u32 LE | payload: len bytes | mac: ceil(tau / 8) bytes |
//! ```
//!
//! The MAC is the payload's Toeplitz hash XORed with fresh one-time-pad
//! bytes drawn from the bootstrap secret, so authentication holds against
//! unbounded adversaries. Both peers must consume identical pad bytes per
//! message in identical order; any divergence, tampering or reordering
//! surfaces as [`Error::MacInvalid`] on the next read.

use std::io::Read;

use bb84_crypto::ToeplitzMac;
use tracing::trace;

use crate::config::Channel;
use crate::error::{Error, ProtocolError};
use crate::wire::Message;

/// Hard cap on a single frame payload. Generous: the largest legitimate
/// frame is a basis announcement of five bit arrays over one batch.
pub const MAX_FRAME_BYTES: usize = 1 << 24;

/// Local traffic counters, split by direction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Traffic {
    /// Frames written.
    pub messages_sent: usize,
    /// Frames read and authenticated.
    pub messages_received: usize,
    /// Bytes written, including length prefixes and MACs.
    pub bytes_sent: usize,
    /// Bytes read, including length prefixes and MACs.
    pub bytes_read: usize,
}

/// A framed, authenticated message channel over an opaque byte stream.
pub struct AuthFramer {
    channel: Box<dyn Channel>,
    secret: Box<dyn Read + Send>,
    mac: ToeplitzMac,
    traffic: Traffic,
}

impl AuthFramer {
    /// Wrap `channel`, authenticating with `mac` and padding tags from
    /// `secret`.
    #[must_use]
    pub fn new(channel: Box<dyn Channel>, secret: Box<dyn Read + Send>, mac: ToeplitzMac) -> Self {
        Self {
            channel,
            secret,
            mac,
            traffic: Traffic::default(),
        }
    }

    /// Serialize, frame, authenticate and write one message.
    ///
    /// # Errors
    ///
    /// `Io` on channel or secret-stream failure, `Shape` if the MAC seed
    /// cannot cover the payload.
    pub fn send(&mut self, msg: &Message) -> Result<(), Error> {
        let payload = msg.encode();
        let mut pad = self.next_pad()?;
        let tag = self.mac.tag(&payload, &mut pad)?;

        let mut frame = Vec::with_capacity(4 + payload.len() + tag.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&tag);
        self.channel.write_all(&frame)?;
        self.channel.flush()?;

        self.traffic.messages_sent += 1;
        self.traffic.bytes_sent += frame.len();
        trace!(kind = msg.kind(), bytes = frame.len(), "frame sent");
        Ok(())
    }

    /// Read, authenticate and parse one message.
    ///
    /// # Errors
    ///
    /// `Io` on channel failure, `MacInvalid` if the recomputed tag
    /// disagrees (fatal: the pad for this frame is already consumed),
    /// `Protocol` if the authenticated payload does not parse.
    pub fn recv(&mut self) -> Result<Message, Error> {
        let mut header = [0u8; 4];
        self.channel.read_exact(&mut header)?;
        let len = u32::from_le_bytes(header) as usize;
        if len > MAX_FRAME_BYTES {
            return Err(ProtocolError::Oversized {
                got: len,
                limit: MAX_FRAME_BYTES,
            }
            .into());
        }

        let mut payload = vec![0u8; len];
        self.channel.read_exact(&mut payload)?;
        let mut tag = vec![0u8; self.mac.pad_len()];
        self.channel.read_exact(&mut tag)?;

        let mut pad = self.next_pad()?;
        if !self.mac.verify(&payload, &mut pad, &tag)? {
            return Err(Error::MacInvalid);
        }

        self.traffic.messages_received += 1;
        self.traffic.bytes_read += 4 + len + tag.len();
        let msg = Message::decode(&payload)?;
        trace!(kind = msg.kind(), bytes = 4 + len + tag.len(), "frame received");
        Ok(msg)
    }

    /// Snapshot of the traffic counters.
    #[must_use]
    pub fn traffic(&self) -> Traffic {
        self.traffic
    }

    fn next_pad(&mut self) -> Result<Vec<u8>, Error> {
        let mut pad = vec![0u8; self.mac.pad_len()];
        self.secret.read_exact(&mut pad)?;
        Ok(pad)
    }
}
