//! The packet API the device application calls.
//!
//! [`PacketLink`] ties the [`PacketReceiver`] to a [`SerialPort`] and a
//! [`Clock`]: it answers the receiver's events on the wire (READY after an
//! accepted prologue, NAK after any rejection) and formats outgoing packets.

use core::fmt::Write as _;

use packet_proto::{
    control_packet, encode_packet, Checksum, Crc8, MessageType, PacketBuilder, PacketView,
    MAX_PACKET_LEN,
};

use crate::clock::Clock;
use crate::frame::SharedFrame;
use crate::port::{transmit, SerialPort, TxError};
use crate::receiver::{PacketReceiver, RxEvent, RxState, DEFAULT_TIMEOUT_MS};

/// Line rate used by the gateway firmware and the backhaul.
pub const DEFAULT_BAUD: u32 = 250_000;

/// Runtime configuration for a [`PacketLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Receive timeout window, measured from the first prologue byte.
    pub timeout_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Device end of the stop-and-wait link.
///
/// # Example
///
/// ```
/// use packet_core::{Clock, LinkConfig, PacketLink, SerialPort, SharedFrame};
///
/// struct Uart;
/// impl SerialPort for Uart {
///     fn configure(&mut self, _baud: u32) {}
///     fn is_tx_ready(&self) -> bool { true }
///     fn write_byte(&mut self, _byte: u8) {}
/// }
///
/// struct Ticks;
/// impl Clock for Ticks {
///     fn now_ms(&self) -> u32 { 0 }
/// }
///
/// static FRAME: SharedFrame = SharedFrame::new();
///
/// let mut link: PacketLink<'_, _, _> =
///     PacketLink::new(&FRAME, Uart, Ticks, LinkConfig::default());
/// link.begin(packet_core::DEFAULT_BAUD);
///
/// if let Some(packet) = link.is_message_waiting() {
///     let _tag = packet.tag();
///     link.acknowledge_handled_packet();
/// }
/// ```
pub struct PacketLink<'a, P, K, C = Crc8> {
    receiver: PacketReceiver<'a, C>,
    port: P,
    clock: K,
}

impl<'a, P: SerialPort, K: Clock, C: Checksum> PacketLink<'a, P, K, C> {
    /// Create a link over `frame`, which the receive interrupt feeds.
    pub fn new(frame: &'a SharedFrame, port: P, clock: K, config: LinkConfig) -> Self {
        Self {
            receiver: PacketReceiver::new(frame, config.timeout_ms),
            port,
            clock,
        }
    }

    /// Configure the line, empty the receiver, and announce the device with
    /// an ALIVE packet.
    ///
    /// Configuration runs with interrupts masked. Call once at startup.
    pub fn begin(&mut self, baud: u32) {
        critical_section::with(|_| self.port.configure(baud));
        self.receiver.reset();
        debug!("link up at {} baud", baud);
        self.indicate_alive();
    }

    /// Advance the receiver once and answer it on the wire.
    ///
    /// This is the diagnostic form of
    /// [`is_message_waiting`](Self::is_message_waiting): the returned event
    /// tells which rejection caused a NAK.
    pub fn poll(&mut self) -> RxEvent {
        let event = self.receiver.poll(self.clock.now_ms());
        match event {
            RxEvent::Accepted => self.send_control(MessageType::Ready),
            RxEvent::Rejected(_) => self.send_control(MessageType::Nak),
            RxEvent::Idle | RxEvent::Ready => {}
        }
        event
    }

    /// Poll for a validated packet.
    ///
    /// Returns the same packet on every call until
    /// [`acknowledge_handled_packet`](Self::acknowledge_handled_packet).
    pub fn is_message_waiting(&mut self) -> Option<PacketView<'_>> {
        match self.poll() {
            RxEvent::Ready => self.receiver.packet(),
            _ => None,
        }
    }

    /// Release the current packet and tell the peer to send the next one.
    pub fn acknowledge_handled_packet(&mut self) {
        self.receiver.acknowledge();
        self.send_control(MessageType::Ready);
    }

    /// Send an ALIVE packet.
    pub fn indicate_alive(&mut self) {
        self.send_control(MessageType::Alive);
    }

    /// Send formatted text as a PRINT packet, truncated to one packet.
    ///
    /// Returns `true` if the text had to be truncated.
    pub fn printf(&mut self, args: core::fmt::Arguments<'_>) -> bool {
        let mut writer = PacketBuilder::<C>::with_checksum(MessageType::Print).writer();
        // The writer never fails; a failing Display impl just ends the text.
        let _ = writer.write_fmt(args);
        let truncated = writer.truncated();
        let packet = writer.finish_in_place();
        let _ = transmit(&mut self.port, packet);
        truncated
    }

    /// Send `payload` back as an ECHO packet.
    ///
    /// # Errors
    ///
    /// [`TxError::Packet`] if the payload does not fit in one packet.
    pub fn echo(&mut self, payload: &[u8]) -> Result<(), TxError> {
        self.send(MessageType::Echo, payload)
    }

    /// Encode and send one packet.
    ///
    /// # Errors
    ///
    /// [`TxError::Packet`] if the payload does not fit in one packet.
    pub fn send(&mut self, ty: MessageType, payload: &[u8]) -> Result<(), TxError> {
        let mut buf = [0u8; MAX_PACKET_LEN];
        let len = encode_packet::<C>(ty.to_wire(), payload, &mut buf)?;
        transmit(&mut self.port, &buf[..len])
    }

    /// Send caller-formed packet bytes unchanged.
    ///
    /// # Errors
    ///
    /// [`TxError::Truncated`] if `packet` is shorter than its length byte.
    pub fn transmit_raw(&mut self, packet: &[u8]) -> Result<(), TxError> {
        transmit(&mut self.port, packet)
    }

    /// Current receive state.
    pub fn state(&self) -> RxState {
        self.receiver.state()
    }

    /// Get a reference to the serial port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get a mutable reference to the serial port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Get a reference to the clock.
    pub fn clock(&self) -> &K {
        &self.clock
    }

    fn send_control(&mut self, ty: MessageType) {
        trace!("send control {}", ty);
        // Header-only packets always match their own length byte.
        let _ = transmit(&mut self.port, &control_packet::<C>(ty));
    }
}
