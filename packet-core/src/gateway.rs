//! Gateway: relays between the serial link and a radio.

use packet_proto::{Checksum, Command, Crc8, DecodeError, Packet, PacketView};

use crate::clock::Clock;
use crate::link::PacketLink;
use crate::port::{SerialPort, TxError};
use crate::radio::{Radio, RadioError};

/// What a single [`Gateway::process_one`] step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Activity {
    /// A radio frame was forwarded to the host.
    pub forwarded: bool,
    /// A host packet was handled and acknowledged.
    pub handled: bool,
}

/// Error type for gateway operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GatewayError {
    /// A host command could not be decoded.
    Decode(DecodeError),
    /// The radio refused a command.
    Radio(RadioError),
    /// A reply could not be sent to the host.
    Tx(TxError),
}

impl core::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode: {}", e),
            Self::Radio(e) => write!(f, "radio: {}", e),
            Self::Tx(e) => write!(f, "tx: {}", e),
        }
    }
}

impl From<DecodeError> for GatewayError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<RadioError> for GatewayError {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

impl From<TxError> for GatewayError {
    fn from(e: TxError) -> Self {
        Self::Tx(e)
    }
}

/// The device application: forwards radio traffic to the host and executes
/// host commands.
///
/// Every host packet is acknowledged after it is handled, whether or not
/// handling succeeded; failures are reported to the host as PRINT text so the
/// host never has to retransmit a packet the device already rejected on
/// content.
pub struct Gateway<'a, P, K, R, C = Crc8> {
    link: PacketLink<'a, P, K, C>,
    radio: R,
}

impl<'a, P: SerialPort, K: Clock, R: Radio, C: Checksum> Gateway<'a, P, K, R, C> {
    /// Create a gateway from a link and a radio.
    pub fn new(link: PacketLink<'a, P, K, C>, radio: R) -> Self {
        Self { link, radio }
    }

    /// Bring the link up. See [`PacketLink::begin`].
    pub fn start(&mut self, baud: u32) {
        self.link.begin(baud);
    }

    /// Perform one cooperative step.
    ///
    /// Returns what was done; an error means a host command failed (it has
    /// still been acknowledged and reported).
    pub fn process_one(&mut self) -> Result<Activity, GatewayError> {
        let mut activity = Activity::default();

        if let Some(frame) = self.radio.poll_receive() {
            let packet = frame
                .as_radio_packet()
                .to_packet::<C>()
                .map_err(TxError::from)?;
            self.link.transmit_raw(packet.as_bytes())?;
            activity.forwarded = true;
        }

        let packet = match self.link.is_message_waiting() {
            Some(view) => view.to_packet(),
            None => return Ok(activity),
        };

        let result = self.dispatch(&packet);
        if let Err(e) = result {
            warn!("command {} failed: {}", packet.tag(), e);
            self.link.printf(format_args!("error: {}", e));
        }
        self.link.acknowledge_handled_packet();
        activity.handled = true;

        result.map(|()| activity)
    }

    fn dispatch(&mut self, packet: &Packet) -> Result<(), GatewayError> {
        let view = PacketView::parse_with::<C>(packet.as_bytes()).map_err(DecodeError::from)?;

        match Command::decode(view)? {
            Command::Echo(payload) => self.link.echo(payload)?,
            Command::InitRadio(config) => self.radio.init(&config)?,
            Command::EncryptKey(key) => self.radio.set_key(&key)?,
            Command::ToRadio(msg) => self.radio.send(msg.node_id, msg.data)?,
            Command::Other { tag, .. } => {
                debug!("ignoring packet type {}", tag);
            }
        }
        Ok(())
    }

    /// Get a reference to the link.
    pub fn link(&self) -> &PacketLink<'a, P, K, C> {
        &self.link
    }

    /// Get a mutable reference to the link.
    pub fn link_mut(&mut self) -> &mut PacketLink<'a, P, K, C> {
        &mut self.link
    }

    /// Get a reference to the radio.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Get a mutable reference to the radio.
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Decompose the gateway into its link and radio.
    pub fn into_parts(self) -> (PacketLink<'a, P, K, C>, R) {
        (self.link, self.radio)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::frame::SharedFrame;
    use crate::link::tests::{CapturePort, MockClock};
    use crate::link::LinkConfig;
    use crate::radio::{NullRadio, RadioFrame};
    use heapless::Vec as HVec;
    use packet_proto::{DeviceMessage, EncryptKey, MessageType, RadioInit, ToRadio};
    use std::vec::Vec;

    #[derive(Default)]
    struct MockRadio {
        init: Option<RadioInit>,
        key: Option<EncryptKey>,
        sent: Vec<(u16, Vec<u8>)>,
        inbox: Vec<RadioFrame>,
    }

    impl Radio for MockRadio {
        fn init(&mut self, config: &RadioInit) -> Result<(), RadioError> {
            self.init = Some(*config);
            Ok(())
        }

        fn set_key(&mut self, key: &EncryptKey) -> Result<(), RadioError> {
            self.key = Some(*key);
            Ok(())
        }

        fn send(&mut self, node_id: u16, data: &[u8]) -> Result<(), RadioError> {
            if self.init.is_none() {
                return Err(RadioError::Rejected);
            }
            self.sent.push((node_id, data.to_vec()));
            Ok(())
        }

        fn poll_receive(&mut self) -> Option<RadioFrame> {
            self.inbox.pop()
        }
    }

    fn new_link<'a>(
        frame: &'a SharedFrame,
        clock: &'a MockClock,
    ) -> PacketLink<'a, CapturePort, &'a MockClock> {
        PacketLink::new(frame, CapturePort::default(), clock, LinkConfig::default())
    }

    /// Deliver `packet` through the prologue handshake and let the gateway
    /// handle it. Output from the handshake itself is dropped.
    fn deliver<R: Radio>(
        gw: &mut Gateway<'_, CapturePort, &MockClock, R>,
        frame: &SharedFrame,
        packet: &Packet,
    ) -> Result<Activity, GatewayError> {
        for b in packet.prologue() {
            frame.on_byte_received(b, 0);
        }
        assert_eq!(gw.process_one(), Ok(Activity::default()));
        for &b in packet.body() {
            frame.on_byte_received(b, 0);
        }
        gw.link_mut().port_mut().sent.clear();
        gw.process_one()
    }

    fn replies(gw: &mut Gateway<'_, CapturePort, &MockClock, impl Radio>) -> Vec<Vec<u8>> {
        gw.link_mut().port_mut().take_packets()
    }

    fn decoded(packets: &[Vec<u8>]) -> Vec<DeviceMessage<'_>> {
        packets
            .iter()
            .map(|p| DeviceMessage::decode(p).unwrap())
            .collect()
    }

    #[test]
    fn test_echo_round_trip() {
        let frame = SharedFrame::new();
        let clock = MockClock::default();
        let link = new_link(&frame, &clock);
        let mut gw = Gateway::new(link, NullRadio);

        let packet = Packet::new(MessageType::Echo, b"loop").unwrap();
        let activity = deliver(&mut gw, &frame, &packet).unwrap();
        assert!(activity.handled);

        let out = replies(&mut gw);
        assert_eq!(
            decoded(&out),
            [DeviceMessage::Echo(b"loop"), DeviceMessage::Ready]
        );
    }

    #[test]
    fn test_radio_commands_are_forwarded() {
        let frame = SharedFrame::new();
        let clock = MockClock::default();
        let link = new_link(&frame, &clock);
        let mut gw = Gateway::new(link, MockRadio::default());

        let init = RadioInit {
            frequency_mhz: 915,
            node_id: 1,
            network_id: 100,
        };
        let packet = Packet::new(MessageType::InitRadio, &init.encode()).unwrap();
        deliver(&mut gw, &frame, &packet).unwrap();
        assert_eq!(gw.radio().init, Some(init));

        let key = [0x11u8; 16];
        let packet = Packet::new(MessageType::EncryptKey, &key).unwrap();
        deliver(&mut gw, &frame, &packet).unwrap();
        assert_eq!(gw.radio().key, Some(EncryptKey(key)));

        let mut buf = [0u8; 16];
        let n = ToRadio {
            node_id: 42,
            data: b"on",
        }
        .encode(&mut buf)
        .unwrap();
        let packet = Packet::new(MessageType::ToRadio, &buf[..n]).unwrap();
        deliver(&mut gw, &frame, &packet).unwrap();
        assert_eq!(gw.radio().sent, [(42u16, b"on".to_vec())]);

        let out = replies(&mut gw);
        assert_eq!(decoded(&out), [DeviceMessage::Ready]);
    }

    #[test]
    fn test_failures_are_reported_and_acknowledged() {
        let frame = SharedFrame::new();
        let clock = MockClock::default();
        let link = new_link(&frame, &clock);
        let mut gw = Gateway::new(link, NullRadio);

        // 868 MHz is valid but there is no radio.
        let init = RadioInit {
            frequency_mhz: 868,
            node_id: 3,
            network_id: 1,
        };
        let packet = Packet::new(MessageType::InitRadio, &init.encode()).unwrap();
        assert_eq!(
            deliver(&mut gw, &frame, &packet),
            Err(GatewayError::Radio(RadioError::NotAttached))
        );
        let out = replies(&mut gw);
        assert_eq!(
            decoded(&out),
            [
                DeviceMessage::Print(b"error: radio: no radio attached"),
                DeviceMessage::Ready
            ]
        );

        // Wrong-size key.
        let packet = Packet::new(MessageType::EncryptKey, &[1, 2, 3]).unwrap();
        assert_eq!(
            deliver(&mut gw, &frame, &packet),
            Err(GatewayError::Decode(DecodeError::Malformed))
        );
        assert_eq!(replies(&mut gw).len(), 2);
        assert!(gw.link().port().sent.is_empty());
    }

    #[test]
    fn test_unknown_tags_are_acknowledged() {
        let frame = SharedFrame::new();
        let clock = MockClock::default();
        let link = new_link(&frame, &clock);
        let mut gw = Gateway::new(link, NullRadio);

        let packet = Packet::with_tag::<Crc8>(0x7E, b"??").unwrap();
        let activity = deliver(&mut gw, &frame, &packet).unwrap();
        assert!(activity.handled);
        assert_eq!(decoded(&replies(&mut gw)), [DeviceMessage::Ready]);
    }

    #[test]
    fn test_radio_frames_reach_host() {
        let frame = SharedFrame::new();
        let clock = MockClock::default();
        let link = new_link(&frame, &clock);
        let mut radio = MockRadio::default();
        radio.inbox.push(RadioFrame {
            src_node: 9,
            dst_node: 1,
            rssi: -80,
            data: HVec::from_slice(&[0xDE, 0xAD]).unwrap(),
        });
        let mut gw = Gateway::new(link, radio);

        let activity = gw.process_one().unwrap();
        assert_eq!(
            activity,
            Activity {
                forwarded: true,
                handled: false
            }
        );

        let out = replies(&mut gw);
        match decoded(&out).as_slice() {
            [DeviceMessage::FromRadio(p)] => {
                assert_eq!((p.src_node, p.dst_node, p.rssi), (9, 1, -80));
                assert_eq!(p.data, &[0xDE, 0xAD]);
            }
            other => panic!("unexpected output {:?}", other),
        }

        assert_eq!(gw.process_one(), Ok(Activity::default()));
    }
}
