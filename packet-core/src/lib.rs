//! Device side of a stop-and-wait packet link over a raw serial line.
//!
//! This crate turns the unstructured byte stream from a UART into discrete,
//! checksum-verified packets, with a two-byte prologue handshake and ACK/NAK
//! flow control. It has no hardware dependencies: the UART, the clock and the
//! radio are reached through traits, so everything here runs in host tests.
//!
//! # Overview
//!
//! - [`frame`]: the frame buffer shared with the receive interrupt
//!   ([`SharedFrame`], [`FrameBuffer`])
//! - [`receiver`]: the reliability state machine ([`PacketReceiver`])
//! - [`port`]: the serial seam and busy-wait transmitter ([`SerialPort`],
//!   [`transmit`])
//! - [`link`]: the packet API the application calls ([`PacketLink`])
//! - [`gateway`]: the serial-to-radio application ([`Gateway`])
//! - [`sender`]: the host end of the handshake ([`PacketSender`])
//! - [`host`]: sorting device output into replies and queued traffic
//!   ([`HostReceiver`])
//!
//! # Execution contexts
//!
//! Two contexts touch the link. The receive interrupt calls
//! [`SharedFrame::on_byte_received`] for every byte and does nothing else.
//! Everything else runs in a single polling loop: the application calls
//! [`PacketLink::is_message_waiting`] faster than the timeout window, handles
//! the packet, and calls [`PacketLink::acknowledge_handled_packet`].
//!
//! # Example
//!
//! ```
//! use packet_core::{Clock, LinkConfig, PacketLink, SerialPort, SharedFrame};
//! use packet_proto::{MessageType, Packet};
//!
//! #[derive(Default)]
//! struct Wire(Vec<u8>);
//! impl SerialPort for Wire {
//!     fn configure(&mut self, _baud: u32) {}
//!     fn is_tx_ready(&self) -> bool { true }
//!     fn write_byte(&mut self, byte: u8) { self.0.push(byte) }
//! }
//!
//! struct Ticks;
//! impl Clock for Ticks {
//!     fn now_ms(&self) -> u32 { 0 }
//! }
//!
//! static FRAME: SharedFrame = SharedFrame::new();
//! let mut link: PacketLink<'_, _, _> =
//!     PacketLink::new(&FRAME, Wire::default(), Ticks, LinkConfig::default());
//!
//! // The host announces 7 bytes, then sends them once READY comes back.
//! let packet = Packet::new(MessageType::Echo, b"ping").unwrap();
//! for b in packet.prologue() {
//!     FRAME.on_byte_received(b, 0);
//! }
//! assert!(link.is_message_waiting().is_none());
//! for &b in packet.body() {
//!     FRAME.on_byte_received(b, 0);
//! }
//!
//! let received = link.is_message_waiting().unwrap();
//! assert_eq!(received.payload(), b"ping");
//! link.acknowledge_handled_packet();
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Log protocol events through defmt (for embedded logging)
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations,
//! making it suitable for embedded systems with limited resources.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

// Must come first so the logging macros are visible to the other modules.
#[macro_use]
mod fmt;

pub mod clock;
pub mod frame;
pub mod gateway;
pub mod host;
pub mod link;
pub mod port;
pub mod radio;
pub mod receiver;
pub mod sender;

// Re-export main types at crate root
pub use clock::{elapsed_ms, Clock};
pub use frame::{FrameBuffer, SharedFrame};
pub use gateway::{Activity, Gateway, GatewayError};
pub use host::{HostReceiver, Received, DEFAULT_QUEUE_DEPTH};
pub use link::{LinkConfig, PacketLink, DEFAULT_BAUD};
pub use port::{transmit, SerialPort, TxError};
pub use radio::{NullRadio, Radio, RadioError, RadioFrame};
pub use receiver::{PacketReceiver, RxError, RxEvent, RxState, DEFAULT_TIMEOUT_MS};
pub use sender::{HostPort, PacketSender, Reply, SendError, SenderConfig};
