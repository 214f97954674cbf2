//! Packet layout, validation, and the fixed-size control packets.
//!
//! ```text
//! prologue:  [length] [!length]
//! packet:    [length] [checksum] [type] [payload...]   (length bytes total)
//! ```
//!
//! The checksum covers `[type] [payload...]`; the length and checksum bytes
//! themselves are excluded.

use heapless::Vec;

use crate::crc::{Checksum, Crc8};
use crate::types::{
    MessageType, CHECKSUM_OFFSET, HEADER_LEN, LENGTH_OFFSET, MAX_PACKET_LEN, MAX_PAYLOAD_LEN,
    TYPE_OFFSET,
};

/// Errors that can occur while encoding or validating a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// Payload does not fit in a single packet.
    PayloadTooLarge,
    /// Output buffer cannot hold the encoded packet.
    BufferTooSmall,
    /// Fewer bytes than a header, or a length byte below the header size.
    TooShort,
    /// The length byte disagrees with the number of bytes supplied.
    LengthMismatch,
    /// The checksum byte does not match the type and payload.
    Checksum,
}

impl core::fmt::Display for PacketError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PayloadTooLarge => write!(f, "payload too large"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::TooShort => write!(f, "packet shorter than its header"),
            Self::LengthMismatch => write!(f, "length byte mismatch"),
            Self::Checksum => write!(f, "checksum mismatch"),
        }
    }
}

/// Build the two-byte prologue announcing a packet of `length` bytes.
#[inline]
#[must_use]
pub const fn prologue(length: u8) -> [u8; 2] {
    [length, !length]
}

/// Check that `second` is the one's complement of `first`.
#[inline]
#[must_use]
pub const fn prologue_matches(first: u8, second: u8) -> bool {
    first == !second
}

/// Encode a header-only control packet (READY, NAK, ALIVE).
#[must_use]
pub fn control_packet<C: Checksum>(ty: MessageType) -> [u8; HEADER_LEN] {
    let tag = ty.to_wire();
    [HEADER_LEN as u8, C::checksum(&[tag]), tag]
}

/// Encode `tag` and `payload` into `buf`, returning the packet length.
///
/// # Errors
///
/// Returns [`PacketError::PayloadTooLarge`] if the payload exceeds
/// [`MAX_PAYLOAD_LEN`] and [`PacketError::BufferTooSmall`] if `buf` cannot
/// hold the packet.
pub fn encode_packet<C: Checksum>(
    tag: u8,
    payload: &[u8],
    buf: &mut [u8],
) -> Result<usize, PacketError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(PacketError::PayloadTooLarge);
    }
    let len = HEADER_LEN + payload.len();
    if buf.len() < len {
        return Err(PacketError::BufferTooSmall);
    }

    buf[TYPE_OFFSET] = tag;
    buf[HEADER_LEN..len].copy_from_slice(payload);
    seal::<C>(&mut buf[..len]);
    Ok(len)
}

/// Fill in the length and checksum bytes of a packet whose type and payload
/// are already in place. `packet` must be exactly the packet's bytes.
pub(crate) fn seal<C: Checksum>(packet: &mut [u8]) {
    debug_assert!(packet.len() >= HEADER_LEN && packet.len() <= MAX_PACKET_LEN);
    packet[LENGTH_OFFSET] = packet.len() as u8;
    packet[CHECKSUM_OFFSET] = C::checksum(&packet[TYPE_OFFSET..]);
}

/// Read-only view over a structurally complete, checksum-verified packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketView<'a> {
    bytes: &'a [u8],
}

impl<'a> PacketView<'a> {
    /// Validate `bytes` as a packet using the default [`Crc8`] checksum.
    ///
    /// # Errors
    ///
    /// See [`PacketView::parse_with`].
    pub fn parse(bytes: &'a [u8]) -> Result<Self, PacketError> {
        Self::parse_with::<Crc8>(bytes)
    }

    /// Validate `bytes` as a packet using checksum `C`.
    ///
    /// `bytes` must hold exactly one packet: its length byte must equal
    /// `bytes.len()`.
    ///
    /// # Errors
    ///
    /// - [`PacketError::TooShort`] if fewer than [`HEADER_LEN`] bytes.
    /// - [`PacketError::LengthMismatch`] if the length byte disagrees.
    /// - [`PacketError::Checksum`] if the checksum does not verify.
    pub fn parse_with<C: Checksum>(bytes: &'a [u8]) -> Result<Self, PacketError> {
        if bytes.len() < HEADER_LEN {
            return Err(PacketError::TooShort);
        }
        if bytes[LENGTH_OFFSET] as usize != bytes.len() {
            return Err(PacketError::LengthMismatch);
        }
        if C::checksum(&bytes[TYPE_OFFSET..]) != bytes[CHECKSUM_OFFSET] {
            return Err(PacketError::Checksum);
        }
        Ok(Self { bytes })
    }

    /// Total length, header included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false: a valid packet carries at least its header.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Checksum byte as carried in the header.
    #[inline]
    #[must_use]
    pub fn checksum(&self) -> u8 {
        self.bytes[CHECKSUM_OFFSET]
    }

    /// Raw type tag; unknown tags are passed through untouched.
    #[inline]
    #[must_use]
    pub fn tag(&self) -> u8 {
        self.bytes[TYPE_OFFSET]
    }

    /// Decoded type tag, if it is one this protocol version knows.
    #[inline]
    #[must_use]
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_wire(self.tag())
    }

    /// Payload bytes following the header.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[HEADER_LEN..]
    }

    /// The whole packet, header included.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Copy into an owned [`Packet`].
    #[must_use]
    pub fn to_packet(&self) -> Packet {
        let mut bytes = Vec::new();
        // A view never exceeds MAX_PACKET_LEN: its length fits in one byte.
        let _ = bytes.extend_from_slice(self.bytes);
        Packet { bytes }
    }
}

/// Owned packet, header included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: Vec<u8, MAX_PACKET_LEN>,
}

impl Packet {
    /// Build a packet with the default [`Crc8`] checksum.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::PayloadTooLarge`] if the payload does not fit.
    pub fn new(ty: MessageType, payload: &[u8]) -> Result<Self, PacketError> {
        Self::with_tag::<Crc8>(ty.to_wire(), payload)
    }

    /// Build a packet with an arbitrary tag and checksum `C`.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::PayloadTooLarge`] if the payload does not fit.
    pub fn with_tag<C: Checksum>(tag: u8, payload: &[u8]) -> Result<Self, PacketError> {
        let mut buf = [0u8; MAX_PACKET_LEN];
        let len = encode_packet::<C>(tag, payload, &mut buf)?;
        let mut bytes = Vec::new();
        bytes
            .extend_from_slice(&buf[..len])
            .map_err(|_| PacketError::PayloadTooLarge)?;
        Ok(Self { bytes })
    }

    /// Length byte as carried on the wire.
    #[inline]
    #[must_use]
    pub fn length_byte(&self) -> u8 {
        self.bytes[LENGTH_OFFSET]
    }

    /// Raw type tag.
    #[inline]
    #[must_use]
    pub fn tag(&self) -> u8 {
        self.bytes[TYPE_OFFSET]
    }

    /// Decoded type tag, if known.
    #[inline]
    #[must_use]
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_wire(self.tag())
    }

    /// Payload bytes following the header.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..]
    }

    /// The whole packet, header included.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes sent after an accepted prologue: everything but the length byte.
    #[inline]
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.bytes[CHECKSUM_OFFSET..]
    }

    /// The prologue announcing this packet.
    #[inline]
    #[must_use]
    pub fn prologue(&self) -> [u8; 2] {
        prologue(self.length_byte())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::calculate_crc8;

    /// Sums the bytes; distinct from CRC-8 so the seam is observable.
    struct Sum8;

    impl Checksum for Sum8 {
        fn checksum(data: &[u8]) -> u8 {
            data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
        }
    }

    #[test]
    fn test_prologue_is_length_and_complement() {
        assert_eq!(prologue(7), [0x07, 0xF8]);
        assert_eq!(prologue(0xFF), [0xFF, 0x00]);
        assert!(prologue_matches(7, 0xF8));
        assert!(!prologue_matches(7, 0x07));
    }

    #[test]
    fn test_encode_layout() {
        let mut buf = [0u8; 16];
        let len = encode_packet::<Crc8>(0x03, b"abc", &mut buf).unwrap();

        assert_eq!(len, 6);
        assert_eq!(buf[0], 6);
        assert_eq!(buf[1], calculate_crc8(&[0x03, b'a', b'b', b'c']));
        assert_eq!(buf[2], 0x03);
        assert_eq!(&buf[3..6], b"abc");
    }

    #[test]
    fn test_control_packet_is_header_only() {
        let ack = control_packet::<Crc8>(MessageType::Ready);
        assert_eq!(ack, [3, calculate_crc8(&[0x02]), 0x02]);

        let view = PacketView::parse(&ack).unwrap();
        assert_eq!(view.message_type(), Some(MessageType::Ready));
        assert!(view.payload().is_empty());
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = [0u8; MAX_PAYLOAD_LEN + 1];
        let mut buf = [0u8; 300];
        assert_eq!(
            encode_packet::<Crc8>(0x03, &payload, &mut buf),
            Err(PacketError::PayloadTooLarge)
        );
    }

    #[test]
    fn test_encode_rejects_small_buffer() {
        let mut buf = [0u8; 4];
        assert_eq!(
            encode_packet::<Crc8>(0x03, b"abc", &mut buf),
            Err(PacketError::BufferTooSmall)
        );
    }

    #[test]
    fn test_largest_packet() {
        let payload = [0x5Au8; MAX_PAYLOAD_LEN];
        let packet = Packet::new(MessageType::Echo, &payload).unwrap();
        assert_eq!(packet.length_byte(), 255);
        assert_eq!(packet.as_bytes().len(), 255);
        assert_eq!(packet.body().len(), 254);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(PacketView::parse(&[3, 0]), Err(PacketError::TooShort));
        assert_eq!(
            PacketView::parse(&[4, 0x16, 0x02]),
            Err(PacketError::LengthMismatch)
        );

        let mut packet = [0u8; 8];
        let len = encode_packet::<Crc8>(0x03, b"hello", &mut packet).unwrap();
        packet[4] ^= 0x01;
        assert_eq!(
            PacketView::parse(&packet[..len]),
            Err(PacketError::Checksum)
        );
    }

    #[test]
    fn test_unknown_tag_passes_through() {
        let packet = Packet::with_tag::<Crc8>(0x42, b"x").unwrap();
        let view = PacketView::parse(packet.as_bytes()).unwrap();
        assert_eq!(view.tag(), 0x42);
        assert_eq!(view.message_type(), None);
        assert_eq!(view.payload(), b"x");
    }

    #[test]
    fn test_checksum_is_pluggable() {
        let packet = Packet::with_tag::<Sum8>(0x03, &[1, 2, 3]).unwrap();
        assert_eq!(packet.as_bytes()[1], 0x03 + 1 + 2 + 3);
        assert!(PacketView::parse_with::<Sum8>(packet.as_bytes()).is_ok());
    }

    #[test]
    fn test_view_to_packet_preserves_bytes() {
        let packet = Packet::new(MessageType::Print, b"boot").unwrap();
        let view = PacketView::parse(packet.as_bytes()).unwrap();
        assert_eq!(view.to_packet(), packet);
        assert_eq!(packet.prologue(), [7, !7]);
    }
}
