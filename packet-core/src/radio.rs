//! Radio seam used by the gateway.
//!
//! The gateway relays between the serial link and a packet radio. The radio
//! driver itself lives outside this crate; it only has to implement
//! [`Radio`].

use heapless::Vec;
use packet_proto::{EncryptKey, RadioInit, RadioPacket, MAX_FROM_RADIO_LEN};

/// A frame received over the radio, owned so it can outlive the driver's
/// receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioFrame {
    /// Sending node.
    pub src_node: u16,
    /// Addressed node.
    pub dst_node: u16,
    /// Received signal strength, dBm.
    pub rssi: i16,
    /// Radio payload.
    pub data: Vec<u8, MAX_FROM_RADIO_LEN>,
}

impl RadioFrame {
    /// Borrow the frame as a FROM_RADIO payload.
    #[must_use]
    pub fn as_radio_packet(&self) -> RadioPacket<'_> {
        RadioPacket {
            src_node: self.src_node,
            dst_node: self.dst_node,
            rssi: self.rssi,
            data: &self.data,
        }
    }
}

/// Error type for radio operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// No radio is attached to this gateway.
    NotAttached,
    /// The radio refused the request (not initialised, busy, payload too long).
    Rejected,
}

impl core::fmt::Display for RadioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotAttached => write!(f, "no radio attached"),
            Self::Rejected => write!(f, "radio rejected request"),
        }
    }
}

/// A packet radio the gateway forwards to and from.
///
/// Every method must return promptly; the gateway calls them from its
/// polling loop.
pub trait Radio {
    /// Bring the radio up on the given band, node and network.
    fn init(&mut self, config: &RadioInit) -> Result<(), RadioError>;

    /// Install the network encryption key.
    fn set_key(&mut self, key: &EncryptKey) -> Result<(), RadioError>;

    /// Transmit `data` to `node_id`.
    fn send(&mut self, node_id: u16, data: &[u8]) -> Result<(), RadioError>;

    /// Take the next received frame, if any.
    fn poll_receive(&mut self) -> Option<RadioFrame>;
}

/// Stand-in for a gateway without a radio.
///
/// Never receives, and refuses every command with
/// [`RadioError::NotAttached`].
pub struct NullRadio;

impl Radio for NullRadio {
    fn init(&mut self, _config: &RadioInit) -> Result<(), RadioError> {
        Err(RadioError::NotAttached)
    }

    fn set_key(&mut self, _key: &EncryptKey) -> Result<(), RadioError> {
        Err(RadioError::NotAttached)
    }

    fn send(&mut self, _node_id: u16, _data: &[u8]) -> Result<(), RadioError> {
        Err(RadioError::NotAttached)
    }

    fn poll_receive(&mut self) -> Option<RadioFrame> {
        None
    }
}
