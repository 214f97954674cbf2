//! Typed application payloads carried inside validated packets.
//!
//! All multi-byte fields are little-endian.

use crate::crc::{Checksum, Crc8};
use crate::packet::{Packet, PacketError, PacketView};
use crate::types::{MessageType, MAX_PAYLOAD_LEN};

/// Radio frequency bands the gateway radio supports, in MHz.
pub const RADIO_BANDS_MHZ: [u16; 3] = [433, 868, 915];

/// Highest valid radio node id.
pub const MAX_NODE_ID: u16 = 1023;

/// Length of the radio network encryption key.
pub const ENCRYPT_KEY_LEN: usize = 16;

/// Largest radio payload that fits in a TO_RADIO packet.
pub const MAX_TO_RADIO_LEN: usize = MAX_PAYLOAD_LEN - 2;

/// Largest radio payload that fits in a FROM_RADIO packet.
pub const MAX_FROM_RADIO_LEN: usize = MAX_PAYLOAD_LEN - 6;

/// Errors when interpreting a packet's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Payload has the wrong size or layout.
    Malformed,
    /// Radio frequency is not one of [`RADIO_BANDS_MHZ`].
    InvalidFrequency,
    /// Node id exceeds [`MAX_NODE_ID`].
    InvalidNodeId,
    /// Packet failed validation.
    Packet(PacketError),
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed payload"),
            Self::InvalidFrequency => write!(f, "unsupported radio frequency"),
            Self::InvalidNodeId => write!(f, "node id out of range"),
            Self::Packet(e) => write!(f, "invalid packet: {}", e),
        }
    }
}

impl From<PacketError> for DecodeError {
    fn from(err: PacketError) -> Self {
        DecodeError::Packet(err)
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn check_node_id(node_id: u16) -> Result<u16, DecodeError> {
    if node_id > MAX_NODE_ID {
        return Err(DecodeError::InvalidNodeId);
    }
    Ok(node_id)
}

/// INIT_RADIO payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadioInit {
    /// Band in MHz: 433, 868, or 915.
    pub frequency_mhz: u16,
    /// This gateway's node id (0..=1023).
    pub node_id: u16,
    /// Radio network id.
    pub network_id: u8,
}

impl RadioInit {
    /// Encoded payload size.
    pub const SIZE: usize = 5;

    /// Decode and validate.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Malformed`] on a size mismatch, otherwise a range error.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != Self::SIZE {
            return Err(DecodeError::Malformed);
        }
        let frequency_mhz = read_u16(payload, 0);
        if !RADIO_BANDS_MHZ.contains(&frequency_mhz) {
            return Err(DecodeError::InvalidFrequency);
        }
        Ok(Self {
            frequency_mhz,
            node_id: check_node_id(read_u16(payload, 2))?,
            network_id: payload[4],
        })
    }

    /// Encode into the fixed payload layout.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let f = self.frequency_mhz.to_le_bytes();
        let n = self.node_id.to_le_bytes();
        [f[0], f[1], n[0], n[1], self.network_id]
    }
}

/// ENCRYPT_KEY payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncryptKey(pub [u8; ENCRYPT_KEY_LEN]);

impl EncryptKey {
    /// Decode a key; it must be exactly [`ENCRYPT_KEY_LEN`] bytes.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Malformed`] on any other length.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let key: [u8; ENCRYPT_KEY_LEN] = payload.try_into().map_err(|_| DecodeError::Malformed)?;
        Ok(Self(key))
    }
}

/// TO_RADIO payload: destination node followed by the radio data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ToRadio<'a> {
    /// Destination node id.
    pub node_id: u16,
    /// Data to transmit.
    pub data: &'a [u8],
}

impl<'a> ToRadio<'a> {
    /// Decode a TO_RADIO payload.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Malformed`] if shorter than the node id field.
    pub fn decode(payload: &'a [u8]) -> Result<Self, DecodeError> {
        if payload.len() < 2 {
            return Err(DecodeError::Malformed);
        }
        Ok(Self {
            node_id: check_node_id(read_u16(payload, 0))?,
            data: &payload[2..],
        })
    }

    /// Encode into `buf`, returning the payload length.
    ///
    /// # Errors
    ///
    /// [`PacketError::PayloadTooLarge`] if the data does not fit a packet,
    /// [`PacketError::BufferTooSmall`] if `buf` is too short.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, PacketError> {
        if self.data.len() > MAX_TO_RADIO_LEN {
            return Err(PacketError::PayloadTooLarge);
        }
        let len = 2 + self.data.len();
        if buf.len() < len {
            return Err(PacketError::BufferTooSmall);
        }
        buf[..2].copy_from_slice(&self.node_id.to_le_bytes());
        buf[2..len].copy_from_slice(self.data);
        Ok(len)
    }
}

/// FROM_RADIO payload: a frame the gateway's radio received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadioPacket<'a> {
    /// Sending node.
    pub src_node: u16,
    /// Addressed node.
    pub dst_node: u16,
    /// Received signal strength, dBm.
    pub rssi: i16,
    /// Radio payload.
    pub data: &'a [u8],
}

impl<'a> RadioPacket<'a> {
    /// Size of the fixed fields preceding the data.
    pub const FIXED_SIZE: usize = 6;

    /// Decode a FROM_RADIO payload.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Malformed`] if shorter than the fixed fields.
    pub fn decode(payload: &'a [u8]) -> Result<Self, DecodeError> {
        if payload.len() < Self::FIXED_SIZE {
            return Err(DecodeError::Malformed);
        }
        Ok(Self {
            src_node: read_u16(payload, 0),
            dst_node: read_u16(payload, 2),
            rssi: i16::from_le_bytes([payload[4], payload[5]]),
            data: &payload[Self::FIXED_SIZE..],
        })
    }

    /// Build the FROM_RADIO packet for this frame.
    ///
    /// # Errors
    ///
    /// [`PacketError::PayloadTooLarge`] if the data does not fit.
    pub fn to_packet<C: Checksum>(&self) -> Result<Packet, PacketError> {
        if self.data.len() > MAX_FROM_RADIO_LEN {
            return Err(PacketError::PayloadTooLarge);
        }
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        payload[0..2].copy_from_slice(&self.src_node.to_le_bytes());
        payload[2..4].copy_from_slice(&self.dst_node.to_le_bytes());
        payload[4..6].copy_from_slice(&self.rssi.to_le_bytes());
        let len = Self::FIXED_SIZE + self.data.len();
        payload[Self::FIXED_SIZE..len].copy_from_slice(self.data);
        Packet::with_tag::<C>(MessageType::FromRadio.to_wire(), &payload[..len])
    }
}

/// A host-to-device packet, interpreted by the device application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command<'a> {
    /// Send the payload straight back.
    Echo(&'a [u8]),
    /// Bring up the radio.
    InitRadio(RadioInit),
    /// Install the radio network key.
    EncryptKey(EncryptKey),
    /// Transmit over the radio.
    ToRadio(ToRadio<'a>),
    /// Any tag the device does not act on.
    Other {
        /// Raw type tag.
        tag: u8,
        /// Untouched payload.
        payload: &'a [u8],
    },
}

impl<'a> Command<'a> {
    /// Interpret a validated packet.
    ///
    /// # Errors
    ///
    /// Propagates the payload decoder's error for known command types.
    pub fn decode(packet: PacketView<'a>) -> Result<Self, DecodeError> {
        let payload = packet.payload();
        Ok(match packet.message_type() {
            Some(MessageType::Echo) => Command::Echo(payload),
            Some(MessageType::InitRadio) => Command::InitRadio(RadioInit::decode(payload)?),
            Some(MessageType::EncryptKey) => Command::EncryptKey(EncryptKey::decode(payload)?),
            Some(MessageType::ToRadio) => Command::ToRadio(ToRadio::decode(payload)?),
            _ => Command::Other {
                tag: packet.tag(),
                payload,
            },
        })
    }
}

/// A device-to-host packet, interpreted by the backhaul.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceMessage<'a> {
    /// Diagnostic text.
    Print(&'a [u8]),
    /// ACK: prologue or body accepted.
    Ready,
    /// Rejected; retransmit from the prologue.
    Nak,
    /// Device started.
    Alive,
    /// Loopback payload.
    Echo(&'a [u8]),
    /// Frame received over the radio.
    FromRadio(RadioPacket<'a>),
    /// Any other tag.
    Other {
        /// Raw type tag.
        tag: u8,
        /// Untouched payload.
        payload: &'a [u8],
    },
}

impl<'a> DeviceMessage<'a> {
    /// Validate and interpret a complete device packet with the default checksum.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Packet`] if the packet does not validate; a payload
    /// error for malformed FROM_RADIO frames.
    pub fn decode(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        Self::decode_with::<Crc8>(bytes)
    }

    /// Validate and interpret a complete device packet with checksum `C`.
    ///
    /// # Errors
    ///
    /// See [`DeviceMessage::decode`].
    pub fn decode_with<C: Checksum>(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        let packet = PacketView::parse_with::<C>(bytes)?;
        let payload = packet.payload();
        Ok(match packet.message_type() {
            Some(MessageType::Print) => DeviceMessage::Print(payload),
            Some(MessageType::Ready) => DeviceMessage::Ready,
            Some(MessageType::Nak) => DeviceMessage::Nak,
            Some(MessageType::Alive) => DeviceMessage::Alive,
            Some(MessageType::Echo) => DeviceMessage::Echo(payload),
            Some(MessageType::FromRadio) => DeviceMessage::FromRadio(RadioPacket::decode(payload)?),
            _ => DeviceMessage::Other {
                tag: packet.tag(),
                payload,
            },
        })
    }
}
