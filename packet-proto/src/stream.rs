//! Reassembly of device-to-host packets from a raw byte stream.
//!
//! The device writes packets back to back without a prologue. The first byte
//! of each is its length, so the reader takes that many bytes and hands back
//! the packet. A partial packet that stalls for longer than the inter-byte gap
//! is thrown away and the next byte starts a new packet.

use crate::types::{HEADER_LEN, MAX_PACKET_LEN};

/// Default inter-byte gap after which a partial packet is discarded.
pub const DEFAULT_GAP_MS: u32 = 100;

/// Stream reassembly errors. Both leave the stream ready for the next byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamError {
    /// A length byte smaller than the packet header.
    InvalidLength(u8),
}

impl core::fmt::Display for StreamError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidLength(len) => write!(f, "invalid packet length {}", len),
        }
    }
}

/// Byte-at-a-time packet reassembler.
pub struct PacketStream {
    buf: [u8; MAX_PACKET_LEN],
    pos: usize,
    last_byte_ms: u32,
    gap_ms: u32,
    discarded: u32,
}

impl PacketStream {
    /// Create a reassembler with the default gap.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_gap(DEFAULT_GAP_MS)
    }

    /// Create a reassembler that drops partial packets idle for `gap_ms`.
    #[must_use]
    pub const fn with_gap(gap_ms: u32) -> Self {
        Self {
            buf: [0u8; MAX_PACKET_LEN],
            pos: 0,
            last_byte_ms: 0,
            gap_ms,
            discarded: 0,
        }
    }

    /// Forget any partial packet.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Number of partial packets dropped because the stream stalled.
    #[must_use]
    pub fn discarded(&self) -> u32 {
        self.discarded
    }

    /// Whether a packet is partially received.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.pos > 0
    }

    /// Feed one byte received at `now_ms`.
    ///
    /// Returns the complete packet (header included, not yet checksum
    /// verified) once its last byte arrives.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidLength`] if a packet starts with a length byte
    /// shorter than the header; the byte is dropped.
    pub fn push_byte(&mut self, byte: u8, now_ms: u32) -> Result<Option<&[u8]>, StreamError> {
        if self.pos > 0 && now_ms.wrapping_sub(self.last_byte_ms) > self.gap_ms {
            self.pos = 0;
            self.discarded = self.discarded.wrapping_add(1);
        }
        self.last_byte_ms = now_ms;

        if self.pos == 0 && (byte as usize) < HEADER_LEN {
            return Err(StreamError::InvalidLength(byte));
        }

        self.buf[self.pos] = byte;
        self.pos += 1;

        let expected = self.buf[0] as usize;
        if self.pos == expected {
            self.pos = 0;
            return Ok(Some(&self.buf[..expected]));
        }
        Ok(None)
    }
}

impl Default for PacketStream {
    fn default() -> Self {
        Self::new()
    }
}
