//! Serial line seam and the busy-wait transmitter.

use packet_proto::{PacketError, LENGTH_OFFSET};

/// Errors from the transmit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxError {
    /// The raw packet is shorter than its own length byte (or empty).
    Truncated,
    /// The packet could not be encoded.
    Packet(PacketError),
}

impl core::fmt::Display for TxError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Truncated => write!(f, "packet shorter than its length byte"),
            Self::Packet(e) => write!(f, "packet: {}", e),
        }
    }
}

impl From<PacketError> for TxError {
    fn from(e: PacketError) -> Self {
        Self::Packet(e)
    }
}

/// A byte-oriented serial line, as seen from consumer context.
///
/// Implementations wrap the UART. The receive side is not part of this
/// trait: received bytes reach the link through
/// [`SharedFrame::on_byte_received`](crate::SharedFrame::on_byte_received)
/// from the receive interrupt.
pub trait SerialPort {
    /// Configure the line for `baud` bits per second, 8N1.
    fn configure(&mut self, baud: u32);

    /// Whether the transmit register can take another byte. Must not block.
    fn is_tx_ready(&self) -> bool;

    /// Hand one byte to the transmit register. Only called when
    /// [`is_tx_ready`](SerialPort::is_tx_ready) returned `true`.
    fn write_byte(&mut self, byte: u8);
}

impl<T: SerialPort + ?Sized> SerialPort for &mut T {
    fn configure(&mut self, baud: u32) {
        (**self).configure(baud);
    }

    fn is_tx_ready(&self) -> bool {
        (**self).is_tx_ready()
    }

    fn write_byte(&mut self, byte: u8) {
        (**self).write_byte(byte);
    }
}

/// Transmit a pre-formed packet whose first byte is its own length.
///
/// Exactly `packet[0]` bytes are written in order, busy-waiting before each
/// one until the port is ready. Trailing bytes beyond the declared length are
/// not sent.
///
/// # Errors
///
/// Returns [`TxError::Truncated`] if `packet` is empty or shorter than its
/// declared length; nothing is written in that case.
pub fn transmit<P: SerialPort + ?Sized>(port: &mut P, packet: &[u8]) -> Result<(), TxError> {
    let len = match packet.get(LENGTH_OFFSET) {
        Some(&len) if packet.len() >= len as usize => len as usize,
        _ => return Err(TxError::Truncated),
    };

    for &byte in &packet[..len] {
        while !port.is_tx_ready() {
            core::hint::spin_loop();
        }
        port.write_byte(byte);
    }
    Ok(())
}
