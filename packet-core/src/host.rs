//! Host end of the link: sorting device output.
//!
//! The device talks back with two kinds of packet. READY and NAK are flow
//! control for whatever the host is currently sending; everything else
//! (PRINT, ALIVE, ECHO, FROM_RADIO) is traffic for the host application.
//! [`HostReceiver`] reassembles the byte stream, hands flow control straight
//! back to the caller as a [`Reply`], and queues the rest.
//!
//! ```
//! use packet_core::{HostReceiver, Received, Reply};
//! use packet_proto::{control_packet, Crc8, DeviceMessage, MessageType, Packet};
//!
//! let mut rx: HostReceiver = HostReceiver::new();
//! let print = Packet::new(MessageType::Print, b"hi").unwrap();
//!
//! assert_eq!(rx.feed(print.as_bytes(), 0), None);
//! assert_eq!(rx.feed(&control_packet::<Crc8>(MessageType::Ready), 0), Some(Reply::Ready));
//!
//! match rx.wait_for_message() {
//!     Some(Received::Packet(packet)) => {
//!         assert_eq!(DeviceMessage::decode(packet.as_bytes()), Ok(DeviceMessage::Print(b"hi")));
//!     }
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

use core::marker::PhantomData;

use heapless::{Deque, Vec};
use packet_proto::{
    Checksum, Crc8, MessageType, Packet, PacketError, PacketStream, PacketView, DEFAULT_GAP_MS,
    MAX_PACKET_LEN,
};

use crate::clock::elapsed_ms;
use crate::sender::Reply;

/// Default number of device packets held for the application.
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

/// A device packet waiting for the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A validated packet.
    Packet(Packet),
    /// A complete packet that failed validation, kept as it arrived.
    BadPacket {
        /// Raw bytes, length byte first.
        bytes: Vec<u8, MAX_PACKET_LEN>,
        /// Why it was refused.
        error: PacketError,
    },
}

/// Demultiplexes device output into flow control and queued traffic.
pub struct HostReceiver<C = Crc8, const N: usize = DEFAULT_QUEUE_DEPTH> {
    stream: PacketStream,
    queue: Deque<Received, N>,
    /// Start of the current quiet period while draining.
    draining_since: Option<u32>,
    quiet_ms: u32,
    dropped: u32,
    checksum: PhantomData<C>,
}

impl<C: Checksum, const N: usize> HostReceiver<C, N> {
    /// A receiver with the default inter-byte gap.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_gap(DEFAULT_GAP_MS)
    }

    /// A receiver that drops partial packets idle for `gap_ms`, and treats
    /// the line as quiet after the same interval.
    #[must_use]
    pub const fn with_gap(gap_ms: u32) -> Self {
        Self {
            stream: PacketStream::with_gap(gap_ms),
            queue: Deque::new(),
            draining_since: None,
            quiet_ms: gap_ms,
            dropped: 0,
            checksum: PhantomData,
        }
    }

    /// Throw bytes away until the line has been quiet for the gap interval.
    ///
    /// Used when the host attaches to a device that may already be halfway
    /// through a packet. Any partial packet is forgotten.
    pub fn drain(&mut self, now_ms: u32) {
        self.stream.reset();
        self.draining_since = Some(now_ms);
    }

    /// Whether the receiver is still waiting for the line to go quiet.
    pub fn is_draining(&mut self, now_ms: u32) -> bool {
        if let Some(since) = self.draining_since {
            if elapsed_ms(since, now_ms) > self.quiet_ms {
                debug!("line quiet, receiving");
                self.draining_since = None;
            }
        }
        self.draining_since.is_some()
    }

    /// Feed one byte received at `now_ms`.
    ///
    /// Returns the flow-control reply if this byte completed a READY or NAK.
    /// Any other complete packet is queued.
    pub fn push_byte(&mut self, byte: u8, now_ms: u32) -> Option<Reply> {
        if self.is_draining(now_ms) {
            self.draining_since = Some(now_ms);
            return None;
        }

        let bytes = match self.stream.push_byte(byte, now_ms) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(_e) => {
                warn!("dropping byte: {}", _e);
                return None;
            }
        };

        let received = match PacketView::parse_with::<C>(bytes) {
            Ok(view) => match view.message_type() {
                Some(MessageType::Ready) => return Some(Reply::Ready),
                Some(MessageType::Nak) => return Some(Reply::Nak),
                _ => Received::Packet(view.to_packet()),
            },
            Err(error) => {
                warn!("bad device packet: {}", error);
                let mut raw = Vec::new();
                // A completed stream packet is never longer than MAX_PACKET_LEN.
                let _ = raw.extend_from_slice(bytes);
                Received::BadPacket { bytes: raw, error }
            }
        };

        if self.queue.push_back(received).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            warn!("host queue full, packet dropped");
        }
        None
    }

    /// Feed a run of bytes received at `now_ms`.
    ///
    /// Returns the last flow-control reply among them, if any.
    pub fn feed(&mut self, bytes: &[u8], now_ms: u32) -> Option<Reply> {
        bytes
            .iter()
            .fold(None, |reply, &b| self.push_byte(b, now_ms).or(reply))
    }

    /// Take the oldest queued packet.
    pub fn wait_for_message(&mut self) -> Option<Received> {
        self.queue.pop_front()
    }

    /// Number of queued packets.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Packets lost because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl<C: Checksum, const N: usize> Default for HostReceiver<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use packet_proto::{control_packet, DeviceMessage, RadioPacket};
    use std::vec::Vec as StdVec;

    fn ready() -> [u8; 3] {
        control_packet::<Crc8>(MessageType::Ready)
    }

    fn nak() -> [u8; 3] {
        control_packet::<Crc8>(MessageType::Nak)
    }

    fn from_radio(src_node: u16, data: &[u8]) -> Packet {
        RadioPacket {
            src_node,
            dst_node: 1,
            rssi: -60,
            data,
        }
        .to_packet::<Crc8>()
        .unwrap()
    }

    fn drain_all<C: Checksum, const N: usize>(rx: &mut HostReceiver<C, N>) -> StdVec<Received> {
        core::iter::from_fn(|| rx.wait_for_message()).collect()
    }

    #[test]
    fn test_interleaved_traffic_is_sorted() {
        let print = Packet::new(MessageType::Print, b"radio up").unwrap();
        let radio = from_radio(7, b"temp=21");

        let mut wire = StdVec::new();
        wire.extend_from_slice(print.as_bytes());
        wire.extend_from_slice(&ready());
        wire.extend_from_slice(radio.as_bytes());

        let mut rx: HostReceiver = HostReceiver::new();
        let mut replies = StdVec::new();
        for &b in &wire {
            if let Some(reply) = rx.push_byte(b, 0) {
                replies.push(reply);
            }
        }

        assert_eq!(replies, [Reply::Ready]);
        assert_eq!(rx.pending(), 2);
        let queued = drain_all(&mut rx);
        assert_eq!(queued, [Received::Packet(print), Received::Packet(radio.clone())]);

        match DeviceMessage::decode(radio.as_bytes()).unwrap() {
            DeviceMessage::FromRadio(frame) => {
                assert_eq!(frame.src_node, 7);
                assert_eq!(frame.data, b"temp=21");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_nak_is_reported() {
        let mut rx: HostReceiver = HostReceiver::new();
        assert_eq!(rx.feed(&nak(), 0), Some(Reply::Nak));
        assert_eq!(rx.pending(), 0);
    }

    #[test]
    fn test_bad_checksum_is_queued_as_bad_packet() {
        let echo = Packet::new(MessageType::Echo, b"ping").unwrap();
        let mut corrupt = echo.as_bytes().to_vec();
        corrupt[4] ^= 0x01;

        let mut rx: HostReceiver = HostReceiver::new();
        assert_eq!(rx.feed(&corrupt, 0), None);
        // The stream stays aligned for the next packet.
        assert_eq!(rx.feed(&ready(), 0), Some(Reply::Ready));

        match rx.wait_for_message() {
            Some(Received::BadPacket { bytes, error }) => {
                assert_eq!(&bytes[..], &corrupt[..]);
                assert_eq!(error, PacketError::Checksum);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(rx.wait_for_message().is_none());
    }

    #[test]
    fn test_corrupt_flow_control_is_not_a_reply() {
        let mut bad_ready = ready();
        bad_ready[1] ^= 0xFF;

        let mut rx: HostReceiver = HostReceiver::new();
        assert_eq!(rx.feed(&bad_ready, 0), None);
        assert!(matches!(rx.wait_for_message(), Some(Received::BadPacket { .. })));
    }

    #[test]
    fn test_full_queue_drops_newest() {
        let mut rx: HostReceiver<Crc8, 2> = HostReceiver::new();
        for i in 0..3u8 {
            let packet = Packet::new(MessageType::Echo, &[i]).unwrap();
            rx.feed(packet.as_bytes(), 0);
        }
        // Flow control still gets through.
        assert_eq!(rx.feed(&ready(), 0), Some(Reply::Ready));

        assert_eq!(rx.dropped(), 1);
        let payloads: StdVec<StdVec<u8>> = drain_all(&mut rx)
            .into_iter()
            .map(|r| match r {
                Received::Packet(p) => p.payload().to_vec(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(payloads, [[0u8], [1u8]]);
    }

    #[test]
    fn test_drain_discards_until_quiet() {
        let print = Packet::new(MessageType::Print, b"tail of old output").unwrap();

        let mut rx: HostReceiver = HostReceiver::with_gap(100);
        rx.drain(0);
        // Leftovers from before the host attached, arriving steadily.
        assert_eq!(rx.feed(&print.as_bytes()[5..], 50), None);
        assert_eq!(rx.feed(&ready(), 120), None);
        assert!(rx.is_draining(200));
        assert_eq!(rx.pending(), 0);

        // Quiet for longer than the gap: the next bytes are real traffic.
        assert!(!rx.is_draining(221));
        assert_eq!(rx.feed(&ready(), 221), Some(Reply::Ready));
    }

    #[test]
    fn test_drain_ends_on_first_byte_after_quiet() {
        let mut rx: HostReceiver = HostReceiver::with_gap(100);
        rx.drain(0);
        assert_eq!(rx.feed(&ready(), 500), Some(Reply::Ready));
    }
}
