//! Message type tags and wire-level constants.

/// Version of the wire layout and tag table below.
///
/// Bump this whenever a tag value or the header layout changes.
pub const PROTOCOL_VERSION: u8 = 1;

/// Header length: `[length][checksum][type]`.
pub const HEADER_LEN: usize = 3;

/// Largest packet a one-byte length field can describe.
pub const MAX_PACKET_LEN: usize = u8::MAX as usize;

/// Largest payload that fits after the header.
pub const MAX_PAYLOAD_LEN: usize = MAX_PACKET_LEN - HEADER_LEN;

/// Capacity of the receive frame buffer.
pub const FRAME_CAPACITY: usize = 256;

/// Offset of the length byte within a packet.
pub const LENGTH_OFFSET: usize = 0;

/// Offset of the checksum byte within a packet.
pub const CHECKSUM_OFFSET: usize = 1;

/// Offset of the message type tag; the checksum covers everything from here on.
pub const TYPE_OFFSET: usize = 2;

/// Closed set of message types carried in the header's type byte.
///
/// The in-memory variant is decoupled from its wire value; the mapping lives
/// in [`MessageType::to_wire`] and [`MessageType::from_wire`] and is fixed for
/// a given [`PROTOCOL_VERSION`].
///
/// # Example
///
/// ```
/// use packet_proto::MessageType;
///
/// assert_eq!(MessageType::from_wire(0x03), Some(MessageType::Echo));
/// assert_eq!(MessageType::Nak.to_wire(), 0x09);
/// assert!(MessageType::Ready.is_control());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageType {
    /// Diagnostic text, device to host.
    Print,
    /// Handshake or body accepted (ACK), device to host.
    Ready,
    /// Loopback payload, either direction.
    Echo,
    /// Liveness indication sent once after startup.
    Alive,
    /// Radio initialisation command, host to device.
    InitRadio,
    /// Radio network encryption key, host to device.
    EncryptKey,
    /// Frame received by the radio, device to host.
    FromRadio,
    /// Frame to transmit over the radio, host to device.
    ToRadio,
    /// Handshake or body rejected; retransmit from the prologue.
    Nak,
}

impl MessageType {
    /// Every message type, in wire order.
    pub const ALL: [MessageType; 9] = [
        MessageType::Print,
        MessageType::Ready,
        MessageType::Echo,
        MessageType::Alive,
        MessageType::InitRadio,
        MessageType::EncryptKey,
        MessageType::FromRadio,
        MessageType::ToRadio,
        MessageType::Nak,
    ];

    /// Wire value of this tag.
    #[inline]
    #[must_use]
    pub const fn to_wire(self) -> u8 {
        match self {
            MessageType::Print => 0x01,
            MessageType::Ready => 0x02,
            MessageType::Echo => 0x03,
            MessageType::Alive => 0x04,
            MessageType::InitRadio => 0x05,
            MessageType::EncryptKey => 0x06,
            MessageType::FromRadio => 0x07,
            MessageType::ToRadio => 0x08,
            MessageType::Nak => 0x09,
        }
    }

    /// Look up the tag for a wire value. Unknown values yield `None`.
    #[inline]
    #[must_use]
    pub const fn from_wire(value: u8) -> Option<Self> {
        Some(match value {
            0x01 => MessageType::Print,
            0x02 => MessageType::Ready,
            0x03 => MessageType::Echo,
            0x04 => MessageType::Alive,
            0x05 => MessageType::InitRadio,
            0x06 => MessageType::EncryptKey,
            0x07 => MessageType::FromRadio,
            0x08 => MessageType::ToRadio,
            0x09 => MessageType::Nak,
            _ => return None,
        })
    }

    /// Control types are emitted by the link itself, not by applications.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, MessageType::Ready | MessageType::Nak | MessageType::Alive)
    }
}

impl From<MessageType> for u8 {
    fn from(ty: MessageType) -> u8 {
        ty.to_wire()
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        MessageType::from_wire(value).ok_or(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_table_is_a_bijection() {
        for ty in MessageType::ALL {
            assert_eq!(MessageType::from_wire(ty.to_wire()), Some(ty));
        }
        for (i, a) in MessageType::ALL.iter().enumerate() {
            for b in &MessageType::ALL[i + 1..] {
                assert_ne!(a.to_wire(), b.to_wire());
            }
        }
    }

    #[test]
    fn test_unknown_tags() {
        assert_eq!(MessageType::from_wire(0x00), None);
        assert_eq!(MessageType::from_wire(0x0A), None);
        assert_eq!(MessageType::try_from(0xFF), Err(0xFF));
    }

    #[test]
    fn test_header_constants() {
        assert_eq!(MAX_PAYLOAD_LEN, 252);
        assert!(MAX_PACKET_LEN < FRAME_CAPACITY);
        assert_eq!(TYPE_OFFSET, HEADER_LEN - 1);
    }
}
