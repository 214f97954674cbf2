//! Monotonic millisecond time source.

/// A monotonically non-decreasing millisecond clock.
///
/// The value wraps at `u32::MAX`; all interval arithmetic in this crate is
/// wrapping, so a wrap is harmless as long as intervals stay below ~49 days.
pub trait Clock {
    /// Current time in milliseconds.
    fn now_ms(&self) -> u32;
}

impl<T: Clock + ?Sized> Clock for &T {
    #[inline]
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// Milliseconds from `since` to `now`, tolerating wrap-around.
#[inline]
#[must_use]
pub const fn elapsed_ms(since: u32, now: u32) -> u32 {
    now.wrapping_sub(since)
}
