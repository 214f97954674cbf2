//! Packet checksum.
//!
//! The link uses one checksum byte per packet. [`Crc8`] (CRC-8/SMBUS with a
//! 256-byte lookup table) is the default; any other 8-bit function can be
//! plugged in by implementing [`Checksum`] and naming it as the link's type
//! parameter. Both ends of a link must agree on it.

use crc::{Crc, CRC_8_SMBUS};

/// CRC-8/SMBUS calculator with 256-byte lookup table.
const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// A pure, side-effect-free checksum over a byte range.
pub trait Checksum {
    /// Compute the checksum of `data`.
    fn checksum(data: &[u8]) -> u8;
}

/// CRC-8/SMBUS, the protocol's default checksum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc8;

impl Checksum for Crc8 {
    #[inline]
    fn checksum(data: &[u8]) -> u8 {
        calculate_crc8(data)
    }
}

/// Calculate CRC-8 checksum of a byte slice.
#[inline]
#[must_use]
pub fn calculate_crc8(data: &[u8]) -> u8 {
    CRC8.checksum(data)
}
