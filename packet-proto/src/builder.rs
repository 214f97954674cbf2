//! Builder API for assembling outgoing packets.
//!
//! # Example
//!
//! ```
//! use packet_proto::{MessageType, PacketBuilder, PacketView};
//!
//! let mut buf = [0u8; 32];
//! let len = PacketBuilder::new(MessageType::Echo)
//!     .payload(b"ping")
//!     .encode(&mut buf)
//!     .unwrap();
//!
//! let view = PacketView::parse(&buf[..len]).unwrap();
//! assert_eq!(view.payload(), b"ping");
//!
//! // Formatted text goes through a writer instead of a slice.
//! let mut text = PacketBuilder::new(MessageType::Print).writer();
//! core::fmt::Write::write_fmt(&mut text, format_args!("rssi={}", -72)).unwrap();
//! let len = text.finish(&mut buf).unwrap();
//! assert_eq!(&buf[3..len], b"rssi=-72");
//! ```

use core::marker::PhantomData;

use crate::crc::{Checksum, Crc8};
use crate::packet::{encode_packet, seal, Packet, PacketError};
use crate::types::{MessageType, HEADER_LEN, MAX_PACKET_LEN, MAX_PAYLOAD_LEN, TYPE_OFFSET};

/// Fluent builder for a single packet.
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct PacketBuilder<'a, C = Crc8> {
    tag: u8,
    payload: &'a [u8],
    checksum: PhantomData<C>,
}

impl<'a> PacketBuilder<'a, Crc8> {
    /// Start a packet of the given type using the default checksum.
    pub fn new(ty: MessageType) -> Self {
        Self::with_checksum(ty)
    }
}

impl<'a, C: Checksum> PacketBuilder<'a, C> {
    /// Start a packet of the given type using checksum `C`.
    pub fn with_checksum(ty: MessageType) -> Self {
        Self {
            tag: ty.to_wire(),
            payload: &[],
            checksum: PhantomData,
        }
    }

    /// Override the type byte with a raw tag.
    pub fn tag(mut self, tag: u8) -> Self {
        self.tag = tag;
        self
    }

    /// Set the payload.
    pub fn payload(mut self, payload: &'a [u8]) -> Self {
        self.payload = payload;
        self
    }

    /// Encode into `buf`, returning the packet length.
    ///
    /// # Errors
    ///
    /// See [`encode_packet`].
    pub fn encode(self, buf: &mut [u8]) -> Result<usize, PacketError> {
        encode_packet::<C>(self.tag, self.payload, buf)
    }

    /// Encode into an owned [`Packet`].
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::PayloadTooLarge`] if the payload does not fit.
    pub fn build(self) -> Result<Packet, PacketError> {
        Packet::with_tag::<C>(self.tag, self.payload)
    }

    /// Switch to streaming the payload through [`core::fmt::Write`].
    pub fn writer(self) -> PayloadWriter<C> {
        PayloadWriter::new(self.tag)
    }
}

/// Accumulates a formatted payload, silently truncating at
/// [`MAX_PAYLOAD_LEN`].
pub struct PayloadWriter<C = Crc8> {
    buf: [u8; MAX_PACKET_LEN],
    pos: usize,
    truncated: bool,
    checksum: PhantomData<C>,
}

impl<C: Checksum> PayloadWriter<C> {
    fn new(tag: u8) -> Self {
        let mut buf = [0u8; MAX_PACKET_LEN];
        buf[TYPE_OFFSET] = tag;
        Self {
            buf,
            pos: HEADER_LEN,
            truncated: false,
            checksum: PhantomData,
        }
    }

    /// Append raw bytes, truncating at capacity.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let room = MAX_PACKET_LEN - self.pos;
        let take = bytes.len().min(room);
        self.buf[self.pos..self.pos + take].copy_from_slice(&bytes[..take]);
        self.pos += take;
        if take < bytes.len() {
            self.truncated = true;
        }
    }

    /// Payload written so far.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.buf[HEADER_LEN..self.pos]
    }

    /// Whether any input was dropped because the payload was full.
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Seal the packet and copy it into `out`, returning its length.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::BufferTooSmall`] if `out` cannot hold it.
    pub fn finish(mut self, out: &mut [u8]) -> Result<usize, PacketError> {
        let len = self.pos;
        if out.len() < len {
            return Err(PacketError::BufferTooSmall);
        }
        seal::<C>(&mut self.buf[..len]);
        out[..len].copy_from_slice(&self.buf[..len]);
        Ok(len)
    }

    /// Seal the packet in place and return its bytes.
    #[must_use]
    pub fn finish_in_place(&mut self) -> &[u8] {
        let len = self.pos;
        seal::<C>(&mut self.buf[..len]);
        &self.buf[..len]
    }
}

impl<C: Checksum> core::fmt::Write for PayloadWriter<C> {
    /// Text is cut at a character boundary, never inside a UTF-8 sequence.
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let room = MAX_PACKET_LEN - self.pos;
        if s.len() <= room {
            self.push_bytes(s.as_bytes());
            return Ok(());
        }
        let mut end = room;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.push_bytes(&s.as_bytes()[..end]);
        self.truncated = true;
        Ok(())
    }
}

const _: () = assert!(MAX_PACKET_LEN - HEADER_LEN == MAX_PAYLOAD_LEN);
