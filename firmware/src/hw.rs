//! RP2040 bindings for the packet link.
//!
//! The link UART is UART0 on GPIO 0/1, or UART1 on GPIO 4/5 with the `uart1`
//! feature. Its receive and receive-timeout interrupts drain the RX FIFO
//! into [`FRAME`]; everything else runs in thread mode.

use embassy_rp::interrupt::typelevel::{Binding, Handler, Interrupt};
use embassy_rp::pac;
use embassy_rp::uart::{Blocking, Uart};
use embassy_time::Instant;
use packet_core::{Clock, SerialPort, SharedFrame};
use portable_atomic::{AtomicU32, Ordering};

#[cfg(not(feature = "uart1"))]
const LINK_UART: pac::uart::Uart = pac::UART0;
#[cfg(feature = "uart1")]
const LINK_UART: pac::uart::Uart = pac::UART1;

/// Interrupt line of the link UART.
#[cfg(not(feature = "uart1"))]
pub type LinkIrq = embassy_rp::interrupt::typelevel::UART0_IRQ;
/// Interrupt line of the link UART.
#[cfg(feature = "uart1")]
pub type LinkIrq = embassy_rp::interrupt::typelevel::UART1_IRQ;

/// Frame buffer shared by the receive interrupt and the gateway loop.
pub static FRAME: SharedFrame = SharedFrame::new();

/// Bytes received with a framing, parity, break or FIFO overrun error.
static LINE_ERRORS: AtomicU32 = AtomicU32::new(0);

/// Number of receive line errors seen so far.
pub fn line_errors() -> u32 {
    LINE_ERRORS.load(Ordering::Relaxed)
}

/// Byte receiver: moves every byte in the RX FIFO into [`FRAME`].
///
/// Bind it with `bind_interrupts!` and pass the binding to
/// [`enable_rx_interrupt`].
pub struct UartRxHandler;

impl Handler<LinkIrq> for UartRxHandler {
    unsafe fn on_interrupt() {
        let now = EmbassyClock.now_ms();
        // Draining the FIFO clears both the RX and the RX-timeout interrupt.
        while !LINK_UART.uartfr().read().rxfe() {
            let dr = LINK_UART.uartdr().read();
            if dr.fe() || dr.pe() || dr.be() || dr.oe() {
                LINE_ERRORS.fetch_add(1, Ordering::Relaxed);
            }
            FRAME.on_byte_received(dr.data(), now);
        }
    }
}

/// Unmask the link UART's receive interrupts.
///
/// Taking the binding proves [`UartRxHandler`] is installed on [`LinkIrq`].
pub fn enable_rx_interrupt(_irqs: impl Binding<LinkIrq, UartRxHandler>) {
    LINK_UART.uarticr().write(|w| {
        w.set_rxic(true);
        w.set_rtic(true);
    });
    LINK_UART.uartimsc().modify(|w| {
        w.set_rxim(true);
        w.set_rtim(true);
    });
    LinkIrq::unpend();
    // SAFETY: the binding guarantees the handler is installed.
    unsafe { LinkIrq::enable() };
}

/// Transmit side of the link UART.
pub struct HwPort<'d> {
    uart: Uart<'d, Blocking>,
}

impl<'d> HwPort<'d> {
    /// Wrap a UART set up with `Uart::new_blocking`.
    pub fn new(uart: Uart<'d, Blocking>) -> Self {
        Self { uart }
    }
}

impl SerialPort for HwPort<'_> {
    fn configure(&mut self, baud: u32) {
        self.uart.set_baudrate(baud);
    }

    fn is_tx_ready(&self) -> bool {
        !LINK_UART.uartfr().read().txff()
    }

    fn write_byte(&mut self, byte: u8) {
        LINK_UART.uartdr().write(|w| w.set_data(byte));
    }
}

/// Millisecond clock on top of the embassy time driver.
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u32 {
        // Truncation wraps every ~49 days; the link only measures short intervals.
        Instant::now().as_millis() as u32
    }
}
