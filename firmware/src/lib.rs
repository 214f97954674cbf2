//! Serial packet-link radio gateway for RP2040.
//!
//! This crate binds the hardware-independent link in [`packet_core`] to the
//! RP2040: the UART receive interrupt feeds the shared frame buffer, the
//! transmitter busy-waits on the UART FIFO, and time comes from
//! `embassy-time`.

#![no_std]

// Re-export core types for convenience
pub use packet_core::{
    Activity, Gateway, GatewayError, LinkConfig, NullRadio, PacketLink, SharedFrame,
    DEFAULT_BAUD,
};

pub mod hw;

pub use hw::{enable_rx_interrupt, line_errors, EmbassyClock, HwPort, LinkIrq, UartRxHandler, FRAME};
