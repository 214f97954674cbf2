//! Host end of the link: the stop-and-wait sender.
//!
//! Every host packet goes through the same exchange:
//!
//! ```text
//! host                          device
//!  ── [L][!L] ─────────────────►
//!  ◄──────────────────── READY    (or NAK / silence: resend prologue)
//!  ── [crc][type][payload] ────►
//!  ◄──────────────────── READY    (after the application handled it)
//! ```
//!
//! A NAK or a missing READY after the body restarts the exchange from the
//! prologue.

use core::marker::PhantomData;

use packet_proto::{
    prologue, Checksum, Crc8, EncryptKey, MessageType, Packet, PacketError, RadioInit, ToRadio,
    MAX_PAYLOAD_LEN,
};

/// Flow-control answer from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    /// READY: continue.
    Ready,
    /// NAK: start again from the prologue.
    Nak,
}

/// Host-side serial transport.
///
/// `wait_reply` keeps reading device output into a
/// [`HostReceiver`](crate::HostReceiver), which queues everything that is
/// not flow control, and returns at the first READY or NAK.
pub trait HostPort {
    /// Transport error.
    type Error;

    /// Write all of `bytes` to the line.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Wait up to `timeout_ms` for READY or NAK. `Ok(None)` on timeout.
    fn wait_reply(&mut self, timeout_ms: u32) -> Result<Option<Reply>, Self::Error>;
}

/// Retry policy for [`PacketSender`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SenderConfig {
    /// Prologue sends per packet attempt before giving up.
    pub prologue_attempts: u8,
    /// Whole-packet attempts before giving up.
    pub packet_attempts: u8,
    /// How long to wait for READY after a prologue.
    pub prologue_timeout_ms: u32,
    /// How long to wait for READY after a body.
    pub body_timeout_ms: u32,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            prologue_attempts: 10,
            packet_attempts: 10,
            prologue_timeout_ms: 1_000,
            body_timeout_ms: 5_000,
        }
    }
}

/// Error type for [`PacketSender`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError<E> {
    /// The transport failed.
    Port(E),
    /// The packet could not be encoded.
    Packet(PacketError),
    /// The device never acknowledged the packet.
    GaveUp,
}

impl<E: core::fmt::Display> core::fmt::Display for SendError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Port(e) => write!(f, "port: {}", e),
            Self::Packet(e) => write!(f, "packet: {}", e),
            Self::GaveUp => write!(f, "gave up sending packet"),
        }
    }
}

impl<E> From<PacketError> for SendError<E> {
    fn from(e: PacketError) -> Self {
        Self::Packet(e)
    }
}

/// Sends packets to the device with the prologue handshake and retries.
pub struct PacketSender<H, C = Crc8> {
    port: H,
    config: SenderConfig,
    checksum: PhantomData<C>,
}

impl<H: HostPort, C: Checksum> PacketSender<H, C> {
    /// Create a sender over `port`.
    pub fn new(port: H, config: SenderConfig) -> Self {
        Self {
            port,
            config,
            checksum: PhantomData,
        }
    }

    /// Encode and deliver one packet.
    ///
    /// # Errors
    ///
    /// - [`SendError::Packet`] if the payload does not fit.
    /// - [`SendError::GaveUp`] if the retries are exhausted.
    /// - [`SendError::Port`] on transport failure.
    pub fn send(&mut self, ty: MessageType, payload: &[u8]) -> Result<(), SendError<H::Error>> {
        let packet = Packet::with_tag::<C>(ty.to_wire(), payload)?;
        self.send_packet(&packet)
    }

    /// Deliver an already-encoded packet.
    ///
    /// # Errors
    ///
    /// See [`PacketSender::send`].
    pub fn send_packet(&mut self, packet: &Packet) -> Result<(), SendError<H::Error>> {
        for _attempt in 0..self.config.packet_attempts {
            if !self.send_prologue(packet.length_byte())? {
                break;
            }
            if self.send_and_wait(packet.body(), self.config.body_timeout_ms)? {
                return Ok(());
            }
            debug!("body attempt {} not acknowledged", _attempt);
        }
        warn!("gave up sending packet type {}", packet.tag());
        Err(SendError::GaveUp)
    }

    /// Ask the device to echo `payload` back.
    ///
    /// # Errors
    ///
    /// See [`PacketSender::send`].
    pub fn echo(&mut self, payload: &[u8]) -> Result<(), SendError<H::Error>> {
        self.send(MessageType::Echo, payload)
    }

    /// Bring up the device's radio.
    ///
    /// # Errors
    ///
    /// See [`PacketSender::send`].
    pub fn init_radio(&mut self, config: &RadioInit) -> Result<(), SendError<H::Error>> {
        self.send(MessageType::InitRadio, &config.encode())
    }

    /// Install the radio network key.
    ///
    /// # Errors
    ///
    /// See [`PacketSender::send`].
    pub fn set_encryption_key(&mut self, key: &EncryptKey) -> Result<(), SendError<H::Error>> {
        self.send(MessageType::EncryptKey, &key.0)
    }

    /// Have the device transmit `data` to radio node `node_id`.
    ///
    /// # Errors
    ///
    /// See [`PacketSender::send`].
    pub fn send_radio_packet(
        &mut self,
        node_id: u16,
        data: &[u8],
    ) -> Result<(), SendError<H::Error>> {
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        let len = ToRadio { node_id, data }.encode(&mut payload)?;
        self.send(MessageType::ToRadio, &payload[..len])
    }

    /// Get a reference to the transport.
    pub fn port(&self) -> &H {
        &self.port
    }

    /// Get a mutable reference to the transport.
    pub fn port_mut(&mut self) -> &mut H {
        &mut self.port
    }

    /// Consume the sender, returning the transport.
    pub fn into_inner(self) -> H {
        self.port
    }

    fn send_prologue(&mut self, length: u8) -> Result<bool, SendError<H::Error>> {
        let prologue = prologue(length);
        for _ in 0..self.config.prologue_attempts {
            if self.send_and_wait(&prologue, self.config.prologue_timeout_ms)? {
                return Ok(true);
            }
        }
        warn!("prologue for {} bytes not acknowledged", length);
        Ok(false)
    }

    fn send_and_wait(&mut self, bytes: &[u8], timeout_ms: u32) -> Result<bool, SendError<H::Error>> {
        self.port.write_all(bytes).map_err(SendError::Port)?;
        let reply = self.port.wait_reply(timeout_ms).map_err(SendError::Port)?;
        Ok(reply == Some(Reply::Ready))
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::frame::SharedFrame;
    use crate::link::tests::{CapturePort, MockClock};
    use crate::link::{LinkConfig, PacketLink};
    use crate::Clock;
    use crate::host::{HostReceiver, Received};
    use packet_proto::DeviceMessage;
    use std::vec::Vec;

    /// Wires a [`PacketSender`] to a real device-side [`PacketLink`].
    ///
    /// Bytes written by the host land in the device's frame buffer one by
    /// one. `wait_reply` runs the device polling loop, with a trivial
    /// application that records and acknowledges each packet, and sorts the
    /// device's output with a [`HostReceiver`].
    struct Loopback<'a> {
        frame: &'a SharedFrame,
        clock: &'a MockClock,
        device: PacketLink<'a, CapturePort, &'a MockClock>,
        receiver: HostReceiver,
        /// Flip a bit in the next write of this many bytes or more.
        corrupt_next: Option<usize>,
        /// Drop every write (a dead line).
        mute: bool,
        writes: usize,
        delivered: Vec<Vec<u8>>,
        prints: Vec<Vec<u8>>,
    }

    impl<'a> Loopback<'a> {
        fn new(frame: &'a SharedFrame, clock: &'a MockClock) -> Self {
            let mut device =
                PacketLink::new(frame, CapturePort::default(), clock, LinkConfig::default());
            device.begin(crate::DEFAULT_BAUD);
            Self {
                frame,
                clock,
                device,
                receiver: HostReceiver::new(),
                corrupt_next: None,
                mute: false,
                writes: 0,
                delivered: Vec::new(),
                prints: Vec::new(),
            }
        }
    }

    impl HostPort for Loopback<'_> {
        type Error = core::convert::Infallible;

        fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
            self.writes += 1;
            if self.mute {
                return Ok(());
            }
            let mut bytes = bytes.to_vec();
            if self.corrupt_next.is_some_and(|min| bytes.len() >= min) {
                let last = bytes.len() - 1;
                bytes[last] ^= 0x40;
                self.corrupt_next = None;
            }
            for b in bytes {
                self.frame.on_byte_received(b, self.clock.now_ms());
            }
            Ok(())
        }

        fn wait_reply(&mut self, timeout_ms: u32) -> Result<Option<Reply>, Self::Error> {
            for _ in 0..=timeout_ms {
                if let Some(packet) = self.device.is_message_waiting() {
                    self.delivered.push(packet.as_bytes().to_vec());
                    self.device.acknowledge_handled_packet();
                }

                let out = core::mem::take(&mut self.device.port_mut().sent);
                let reply = self.receiver.feed(&out, self.clock.now_ms());
                while let Some(received) = self.receiver.wait_for_message() {
                    if let Received::Packet(packet) = received {
                        if let Ok(DeviceMessage::Print(text)) = DeviceMessage::decode(packet.as_bytes()) {
                            self.prints.push(text.to_vec());
                        }
                    }
                }
                if reply.is_some() {
                    return Ok(reply);
                }
                self.clock.advance(1);
            }
            Ok(None)
        }
    }

    #[test]
    fn test_send_delivers_packet() {
        let frame = SharedFrame::new();
        let clock = MockClock::default();
        let mut sender: PacketSender<_> =
            PacketSender::new(Loopback::new(&frame, &clock), SenderConfig::default());

        sender.echo(b"hello gateway").unwrap();

        let port = sender.into_inner();
        let expected = Packet::new(MessageType::Echo, b"hello gateway").unwrap();
        assert_eq!(port.delivered, [expected.as_bytes().to_vec()]);
        // One prologue and one body.
        assert_eq!(port.writes, 2);
    }

    #[test]
    fn test_corrupt_body_is_retransmitted() {
        let frame = SharedFrame::new();
        let clock = MockClock::default();
        let mut port = Loopback::new(&frame, &clock);
        port.corrupt_next = Some(3);
        let mut sender: PacketSender<_> = PacketSender::new(port, SenderConfig::default());

        sender.send_radio_packet(42, b"lights on").unwrap();

        let port = sender.into_inner();
        assert_eq!(port.delivered.len(), 1);
        let delivered = &port.delivered[0];
        assert_eq!(delivered[3..5], 42u16.to_le_bytes());
        assert_eq!(&delivered[5..], b"lights on");
        // Prologue, corrupted body, prologue, body.
        assert_eq!(port.writes, 4);
    }

    #[test]
    fn test_helpers_encode_payloads() {
        let frame = SharedFrame::new();
        let clock = MockClock::default();
        let mut sender: PacketSender<_> =
            PacketSender::new(Loopback::new(&frame, &clock), SenderConfig::default());

        let init = RadioInit {
            frequency_mhz: 433,
            node_id: 2,
            network_id: 7,
        };
        sender.init_radio(&init).unwrap();
        sender.set_encryption_key(&EncryptKey(*b"0123456789abcdef")).unwrap();

        let port = sender.into_inner();
        let tags: Vec<u8> = port.delivered.iter().map(|p| p[2]).collect();
        assert_eq!(
            tags,
            [MessageType::InitRadio.to_wire(), MessageType::EncryptKey.to_wire()]
        );
        assert_eq!(port.delivered[0][3..], init.encode());
        assert_eq!(&port.delivered[1][3..], b"0123456789abcdef");
    }

    #[test]
    fn test_dead_line_gives_up_after_prologue_attempts() {
        let frame = SharedFrame::new();
        let clock = MockClock::default();
        let mut port = Loopback::new(&frame, &clock);
        port.mute = true;
        let config = SenderConfig {
            prologue_attempts: 3,
            prologue_timeout_ms: 10,
            ..SenderConfig::default()
        };
        let mut sender: PacketSender<_> = PacketSender::new(port, config);

        assert_eq!(sender.echo(b"anyone?"), Err(SendError::GaveUp));
        assert_eq!(sender.port().writes, 3);
    }

    #[test]
    fn test_oversized_payload_rejected_before_sending() {
        let frame = SharedFrame::new();
        let clock = MockClock::default();
        let mut sender: PacketSender<_> =
            PacketSender::new(Loopback::new(&frame, &clock), SenderConfig::default());

        assert_eq!(
            sender.echo(&[0u8; MAX_PAYLOAD_LEN + 1]),
            Err(SendError::Packet(PacketError::PayloadTooLarge))
        );
        assert_eq!(sender.port().writes, 0);
    }

    #[test]
    fn test_device_alive_and_prints_do_not_confuse_replies() {
        let frame = SharedFrame::new();
        let clock = MockClock::default();
        let mut port = Loopback::new(&frame, &clock);
        port.device.printf(format_args!("booting"));
        let mut sender: PacketSender<_> = PacketSender::new(port, SenderConfig::default());

        sender.echo(&[]).unwrap();

        let port = sender.into_inner();
        assert_eq!(port.prints, [b"booting".to_vec()]);
        assert_eq!(port.delivered.len(), 1);
    }
}
