//! Wire format for a stop-and-wait packet link over a raw serial line.
//!
//! This crate holds everything both ends of the link must agree on:
//!
//! - **Types**: the closed message-type table ([`MessageType`]) and the
//!   header constants ([`HEADER_LEN`], [`MAX_PACKET_LEN`], ...)
//! - **Checksum**: the [`Checksum`] seam and its default, [`Crc8`]
//! - **Packets**: [`PacketView`] validation, owned [`Packet`]s, the
//!   [`prologue`] and header-only [`control_packet`]s
//! - **Builder**: [`PacketBuilder`] and the formatted-text [`PayloadWriter`]
//! - **Messages**: typed application payloads ([`Command`], [`DeviceMessage`])
//! - **Stream**: host-side reassembly of device packets ([`PacketStream`])
//!
//! # Protocol Format
//!
//! ```text
//! prologue:  [L] [!L]
//! packet:    [L] [checksum] [type] [payload...]      L bytes in total
//! ```
//!
//! The checksum (CRC-8/SMBUS by default) covers `[type] [payload...]`.
//!
//! A host-to-device transfer is a handshake: the host sends the prologue and
//! waits for READY, then sends the `L - 1` bytes after the length byte. The
//! device answers READY once its application has consumed the packet, or NAK
//! at any point, after which the host starts again from the prologue.
//! Device-to-host packets are written whole, without a prologue.
//!
//! # Example
//!
//! ```
//! use packet_proto::{prologue, Command, MessageType, Packet, PacketView};
//!
//! let packet = Packet::new(MessageType::Echo, b"hello").unwrap();
//! assert_eq!(packet.prologue(), prologue(8));
//!
//! let view = PacketView::parse(packet.as_bytes()).unwrap();
//! assert_eq!(Command::decode(view), Ok(Command::Echo(b"hello")));
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod builder;
pub mod crc;
pub mod messages;
pub mod packet;
pub mod stream;
pub mod types;

pub use builder::{PacketBuilder, PayloadWriter};
pub use crc::{calculate_crc8, Checksum, Crc8};
pub use messages::{
    Command, DecodeError, DeviceMessage, EncryptKey, RadioInit, RadioPacket, ToRadio,
    ENCRYPT_KEY_LEN, MAX_FROM_RADIO_LEN, MAX_NODE_ID, MAX_TO_RADIO_LEN, RADIO_BANDS_MHZ,
};
pub use packet::{
    control_packet, encode_packet, prologue, prologue_matches, Packet, PacketError, PacketView,
};
pub use stream::{PacketStream, StreamError, DEFAULT_GAP_MS};
pub use types::{
    MessageType, CHECKSUM_OFFSET, FRAME_CAPACITY, HEADER_LEN, LENGTH_OFFSET, MAX_PACKET_LEN,
    MAX_PAYLOAD_LEN, PROTOCOL_VERSION, TYPE_OFFSET,
};
