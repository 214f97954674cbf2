//! The frame buffer shared between the byte-received interrupt and the
//! polling consumer.
//!
//! [`FrameBuffer`] is plain data. [`SharedFrame`] wraps it in a
//! `critical_section::Mutex` so that the interrupt handler (the only
//! producer) and the state machine (the only consumer) never observe each
//! other's updates half-done. Every access is a short, named critical
//! section; in particular a reset clears the count and rewinds the write
//! position as one unit, so a byte arriving mid-reset cannot desynchronise
//! them.

use core::cell::RefCell;

use critical_section::{CriticalSection, Mutex};
use packet_proto::FRAME_CAPACITY;

/// Fixed-capacity receive storage for one packet attempt.
///
/// The write position and the byte count are the same index: the next byte
/// is stored at `data[len]`. `data[0]`, once written, is the declared packet
/// length.
#[derive(Debug)]
pub struct FrameBuffer {
    data: [u8; FRAME_CAPACITY],
    len: usize,
    arrival_ms: u32,
    overrun: bool,
}

impl FrameBuffer {
    /// An empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: [0u8; FRAME_CAPACITY],
            len: 0,
            arrival_ms: 0,
            overrun: false,
        }
    }

    /// Append one received byte.
    ///
    /// The first byte after a reset stamps the arrival time. Bytes beyond
    /// capacity are dropped and latch the overrun flag. O(1), never blocks.
    #[inline]
    pub fn push(&mut self, byte: u8, now_ms: u32) {
        if self.len == 0 {
            self.arrival_ms = now_ms;
        }
        if self.len < FRAME_CAPACITY {
            self.data[self.len] = byte;
            self.len += 1;
        } else {
            self.overrun = true;
        }
    }

    /// Empty the buffer for the next packet attempt.
    #[inline]
    pub fn reset(&mut self) {
        self.len = 0;
        self.overrun = false;
    }

    /// Drop the most recently written byte.
    #[inline]
    pub fn discard_last(&mut self) {
        self.len = self.len.saturating_sub(1);
    }

    /// Bytes written since the last reset.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has arrived since the last reset.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The written bytes.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Time the first byte of the current attempt arrived.
    #[inline]
    #[must_use]
    pub fn arrival_ms(&self) -> u32 {
        self.arrival_ms
    }

    /// Whether bytes were dropped for lack of space since the last reset.
    #[inline]
    #[must_use]
    pub fn overrun(&self) -> bool {
        self.overrun
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`FrameBuffer`] shared between interrupt and thread context.
///
/// Construct it once as a `static` and hand references to the interrupt
/// handler and to the [`PacketLink`](crate::PacketLink).
///
/// ```
/// use packet_core::SharedFrame;
///
/// static FRAME: SharedFrame = SharedFrame::new();
///
/// // In the UART receive interrupt:
/// FRAME.on_byte_received(0x05, 1_000);
///
/// assert_eq!(FRAME.inspect(|frame| frame.len()), 1);
/// ```
///
/// Only the byte receiver writes byte contents; outside this crate the
/// buffer is read-only:
///
/// ```compile_fail
/// use packet_core::SharedFrame;
///
/// static FRAME: SharedFrame = SharedFrame::new();
/// FRAME.lock(|frame| frame.push(0x05, 0));
/// ```
pub struct SharedFrame {
    inner: Mutex<RefCell<FrameBuffer>>,
}

impl SharedFrame {
    /// An empty shared buffer, usable in a `static`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(FrameBuffer::new())),
        }
    }

    /// Byte receiver entry point, called from the byte-received interrupt.
    #[inline]
    pub fn on_byte_received(&self, byte: u8, now_ms: u32) {
        critical_section::with(|cs| self.borrow(cs).push(byte, now_ms));
    }

    /// Look at the buffer inside a critical section.
    pub fn inspect<R>(&self, f: impl FnOnce(&FrameBuffer) -> R) -> R {
        critical_section::with(|cs| f(&*self.borrow(cs)))
    }

    /// Run `f` on the buffer inside a critical section.
    pub(crate) fn lock<R>(&self, f: impl FnOnce(&mut FrameBuffer) -> R) -> R {
        critical_section::with(|cs| f(&mut *self.borrow(cs)))
    }

    /// Reset the buffer as one atomic unit with respect to the producer.
    pub fn reset(&self) {
        self.lock(FrameBuffer::reset);
    }

    /// Access the buffer within an already-held critical section.
    fn borrow<'cs>(&'cs self, cs: CriticalSection<'cs>) -> core::cell::RefMut<'cs, FrameBuffer> {
        self.inner.borrow_ref_mut(cs)
    }
}

impl Default for SharedFrame {
    fn default() -> Self {
        Self::new()
    }
}
