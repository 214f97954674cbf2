//! Receive-side reliability state machine.
//!
//! [`PacketReceiver`] is polled from the consumer context. Each call to
//! [`PacketReceiver::poll`] inspects the shared [`FrameBuffer`] once, inside a
//! single critical section, and reports what the link layer must do next:
//! nothing, send an ACK, send a NAK, or hand a validated packet to the
//! application.
//!
//! ```text
//!            byte 1                 [L][!L], L >= 3
//! AwaitingPrologueByte1 ──► AwaitingPrologueByte2 ──────────► AwaitingBody
//!        ▲                        │ timeout / corrupt          │ L bytes, checksum ok
//!        │                        ▼                            ▼
//!        └──────────────────── reset + NAK ◄── timeout ──── ready (until acknowledged)
//!                                         ◄── overrun / checksum mismatch
//! ```
//!
//! Timeouts are measured from the first byte of the attempt, i.e. the first
//! prologue byte, and are only evaluated when the consumer polls.

use core::marker::PhantomData;

use packet_proto::{
    prologue_matches, Checksum, Crc8, PacketView, FRAME_CAPACITY, HEADER_LEN,
    LENGTH_OFFSET,
};

use crate::clock::elapsed_ms;
use crate::frame::{FrameBuffer, SharedFrame};

/// Default receive timeout window in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u32 = 20;

/// Where the receiver is in the current packet attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxState {
    /// Nothing received since the last reset.
    AwaitingPrologueByte1,
    /// The candidate length byte has arrived; waiting for its complement.
    AwaitingPrologueByte2,
    /// Prologue accepted; accumulating the packet body.
    AwaitingBody,
}

/// Why a packet attempt was rejected. Every variant is recovered by NAK and
/// a full reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxError {
    /// The second prologue byte did not arrive in time.
    PrologueTimeout,
    /// The second prologue byte is not the complement of the first.
    PrologueCorrupt,
    /// The declared length is smaller than a packet header.
    LengthOutOfRange,
    /// The declared length was not reached in time.
    BodyTimeout,
    /// More bytes arrived than the packet declared, or than the buffer holds.
    Overrun,
    /// The completed body failed checksum validation.
    ChecksumMismatch,
}

impl core::fmt::Display for RxError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PrologueTimeout => write!(f, "prologue timed out"),
            Self::PrologueCorrupt => write!(f, "prologue corrupt"),
            Self::LengthOutOfRange => write!(f, "declared length out of range"),
            Self::BodyTimeout => write!(f, "body timed out"),
            Self::Overrun => write!(f, "receive overrun"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
        }
    }
}

/// Outcome of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxEvent {
    /// Nothing to do this cycle.
    Idle,
    /// The prologue was accepted; the peer may send the body (send ACK).
    Accepted,
    /// The attempt was discarded and the receiver reset (send NAK).
    Rejected(RxError),
    /// A validated packet is available through [`PacketReceiver::packet`].
    Ready,
}

/// Work decided inside the critical section, finished outside it.
enum Step {
    Idle,
    Accept,
    Reject(RxError),
    Complete(usize),
}

/// The reliability state machine over one shared frame buffer.
///
/// The receive state is owned here and nowhere else; the byte receiver only
/// ever appends to the buffer. A ready packet is copied out of the shared
/// buffer, so repeated polls return identical bytes no matter what the
/// peer sends before the packet is acknowledged.
pub struct PacketReceiver<'a, C = Crc8> {
    frame: &'a SharedFrame,
    state: RxState,
    timeout_ms: u32,
    ready: Option<usize>,
    snapshot: [u8; FRAME_CAPACITY],
    checksum: PhantomData<C>,
}

impl<'a, C: Checksum> PacketReceiver<'a, C> {
    /// Create a receiver over `frame` with the given timeout window.
    pub fn new(frame: &'a SharedFrame, timeout_ms: u32) -> Self {
        Self {
            frame,
            state: RxState::AwaitingPrologueByte1,
            timeout_ms,
            ready: None,
            snapshot: [0u8; FRAME_CAPACITY],
            checksum: PhantomData,
        }
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> RxState {
        self.state
    }

    /// Whether a validated packet is waiting for acknowledgment.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.is_some()
    }

    /// Advance the state machine by one step.
    pub fn poll(&mut self, now_ms: u32) -> RxEvent {
        if self.ready.is_some() {
            return RxEvent::Ready;
        }

        let frame = self.frame;
        let step = frame.lock(|frame| self.step(frame, now_ms));

        match step {
            Step::Idle => RxEvent::Idle,
            Step::Accept => {
                trace!("prologue accepted, length {}", self.snapshot[LENGTH_OFFSET]);
                RxEvent::Accepted
            }
            Step::Reject(err) => {
                warn!("packet rejected: {}", err);
                self.state = RxState::AwaitingPrologueByte1;
                RxEvent::Rejected(err)
            }
            Step::Complete(len) => match PacketView::parse_with::<C>(&self.snapshot[..len]) {
                Ok(_) => {
                    debug!("packet ready, {} bytes", len);
                    self.ready = Some(len);
                    RxEvent::Ready
                }
                Err(_) => {
                    warn!("packet rejected: {}", RxError::ChecksumMismatch);
                    self.reset();
                    RxEvent::Rejected(RxError::ChecksumMismatch)
                }
            },
        }
    }

    /// Runs inside the critical section. Any rejection resets the buffer
    /// before the section is released.
    fn step(&mut self, frame: &mut FrameBuffer, now_ms: u32) -> Step {
        if frame.overrun() {
            frame.reset();
            return Step::Reject(RxError::Overrun);
        }

        if self.state == RxState::AwaitingPrologueByte1 {
            if frame.is_empty() {
                return Step::Idle;
            }
            self.state = RxState::AwaitingPrologueByte2;
        }

        let expired = elapsed_ms(frame.arrival_ms(), now_ms) > self.timeout_ms;
        let bytes = frame.as_slice();

        let step = match self.state {
            RxState::AwaitingPrologueByte1 => Step::Idle,
            RxState::AwaitingPrologueByte2 => match *bytes {
                [_] if expired => Step::Reject(RxError::PrologueTimeout),
                [_] => Step::Idle,
                [length, check] if !prologue_matches(length, check) => {
                    Step::Reject(RxError::PrologueCorrupt)
                }
                [length, _] if (length as usize) < HEADER_LEN => {
                    Step::Reject(RxError::LengthOutOfRange)
                }
                [length, _] => {
                    self.snapshot[LENGTH_OFFSET] = length;
                    Step::Accept
                }
                _ => Step::Reject(RxError::PrologueCorrupt),
            },
            RxState::AwaitingBody => {
                let declared = bytes[LENGTH_OFFSET] as usize;
                let count = bytes.len();
                if count > declared {
                    Step::Reject(RxError::Overrun)
                } else if count < declared {
                    if expired {
                        Step::Reject(RxError::BodyTimeout)
                    } else {
                        Step::Idle
                    }
                } else {
                    self.snapshot[..count].copy_from_slice(bytes);
                    Step::Complete(count)
                }
            }
        };

        match step {
            Step::Accept => {
                frame.discard_last();
                self.state = RxState::AwaitingBody;
            }
            Step::Reject(_) => frame.reset(),
            _ => {}
        }
        step
    }

    /// The validated packet, if one is ready.
    #[must_use]
    pub fn packet(&self) -> Option<PacketView<'_>> {
        let len = self.ready?;
        PacketView::parse_with::<C>(&self.snapshot[..len]).ok()
    }

    /// Release the current packet and return to the initial state.
    ///
    /// Bytes that arrived while the packet was held are discarded.
    pub fn acknowledge(&mut self) {
        self.reset();
    }

    /// Empty the shared buffer and return to the initial state.
    pub fn reset(&mut self) {
        self.frame.reset();
        self.state = RxState::AwaitingPrologueByte1;
        self.ready = None;
    }
}
